//! Patch strategy engine
//!
//! Maps classified errors to candidate patches:
//! - `registry`: plan (type to ordered strategy ids) and implementations
//! - `engine`: first-result-wins dispatch and global prioritization
//! - one file per strategy family

pub mod database;
pub mod diagnostics;
pub mod engine;
pub mod exports;
pub mod imports;
pub mod react;
pub mod registry;
pub mod text;
pub mod types;
pub mod typescript;

pub use engine::{compare_priority, prioritize, PatchStrategyEngine};
pub use registry::{StrategyContext, StrategyFn, StrategyPlan, StrategyRegistry};
pub use types::{EditOperation, FileEdit, PatchCandidate, ReplacePattern, ReplaceSpec, StrategyId};
