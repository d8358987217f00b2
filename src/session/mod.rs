//! Session lifecycle log
//!
//! Records start, test execution, error analysis, patch generation and
//! application, cycle completion, state changes and finish as JSON lines,
//! with running tallies kept in memory.

pub mod log;
pub mod types;

pub use log::SessionLog;
pub use types::{SessionEvent, SessionRecord, SessionStats};
