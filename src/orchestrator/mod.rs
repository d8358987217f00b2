//! Orchestration loop
//!
//! `state` holds the validated loop state machine, `cycle` the driver that
//! runs initial tests and bounded patch cycles, `types` the cycle and
//! session results.

pub mod cycle;
pub mod state;
pub mod types;

pub use cycle::{distinct_files, PatchOrchestrator, ProgressFn};
pub use state::{LoopEvent, LoopState};
pub use types::{CycleResult, CycleTimings, HaltReason, LoopSettings, PhaseTimings, SessionOutcome};
