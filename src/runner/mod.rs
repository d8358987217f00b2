//! Test execution capability
//!
//! The orchestration loop only sees [`TestRunner`]; the process-backed
//! implementation lives in `process`, and tests substitute scripted ones.

pub mod process;
pub mod types;

pub use process::CommandTestRunner;
pub use types::{RunResult, SuiteSpec};

use crate::errors::Result;
use async_trait::async_trait;

/// Runs whole suites or single files and reports combined output
///
/// Timeouts and spawn failures come back as failed [`RunResult`]s; `Err`
/// is reserved for requests the runner cannot interpret at all.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_suite(&self, suite: &str) -> Result<RunResult>;

    async fn run_file(&self, path: &str) -> Result<RunResult>;

    /// Configured suite names, in order
    fn suites(&self) -> Vec<String>;
}
