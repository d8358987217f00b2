//! autopatch v0.5.0 - Automatic Test Failure Patching
//!
//! Runs a project's test suites, classifies the failures found in their
//! output, generates candidate source patches and applies them with backup
//! and rollback, then re-runs the affected tests until they pass or the
//! attempt budget runs out.
//!
//! # Architecture
//!
//! - **classifier**: raw test output → typed, deduplicated error records
//! - **strategies**: error records → prioritised patch candidates
//! - **applier**: patch candidates → file edits with snapshots
//! - **orchestrator**: the bounded test → patch → retest loop
//! - **session / report**: JSON-lines event log and Markdown summary

pub mod errors;
pub mod config;

// Core pipeline
pub mod classifier;
pub mod strategies;
pub mod applier;
pub mod runner;
pub mod orchestrator;

// Outputs
pub mod session;
pub mod report;

// Entry surfaces
pub mod cli;
pub mod watch;

// Re-export commonly used types
pub use errors::{PatchError, Result};
pub use config::Config;
pub use orchestrator::{PatchOrchestrator, SessionOutcome};
