//! Patch application with backup and rollback
//!
//! - `backup`: snapshot naming, restore, retention pruning
//! - `validate`: pre-flight edit checks
//! - `applier`: per-patch transactional apply and the JSON-lines log

pub mod applier;
pub mod backup;
pub mod types;
pub mod validate;

pub use applier::{apply_edit, replace_text, PatchApplier};
pub use backup::{backup_file_name, BackupStore};
pub use types::{ApplierOptions, ApplyBatch, ApplyKind, ApplyResult, BackupRecord, PatchLogEntry};
pub use validate::validate_patch;
