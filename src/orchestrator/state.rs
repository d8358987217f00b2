//! Orchestration loop state machine
//!
//! Valid transitions:
//! 1. Idle                -> RunningInitialTests (on: Start)
//! 2. RunningInitialTests -> AllPassing          (on: InitialTestsPassed)
//! 3. RunningInitialTests -> AnalyzingErrors     (on: InitialTestsFailed)
//! 4. AnalyzingErrors     -> CycleLoop           (on: ErrorsAnalyzed)
//! 5. AnalyzingErrors     -> Done                (on: Halt)
//! 6. CycleLoop           -> Done                (on: Halt)
//! 7. any non-terminal    -> Done                (on: Cancel)
//! 8. AllPassing, Done are terminal (self-loops)

use crate::errors::{PatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    RunningInitialTests,
    /// Initial run had no failures (terminal)
    AllPassing,
    AnalyzingErrors,
    CycleLoop,
    /// Loop stopped (terminal)
    Done,
}

/// Events that drive the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    Start,
    InitialTestsPassed,
    InitialTestsFailed,
    ErrorsAnalyzed,
    Halt,
    Cancel,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::AllPassing | LoopState::Done)
    }

    /// Validated transition
    pub fn transition(&self, event: LoopEvent) -> Result<LoopState> {
        use LoopEvent::*;
        use LoopState::*;

        let next = match (self, event) {
            (AllPassing, _) => AllPassing,
            (Done, _) => Done,
            (_, Cancel) => Done,

            (Idle, Start) => RunningInitialTests,
            (RunningInitialTests, InitialTestsPassed) => AllPassing,
            (RunningInitialTests, InitialTestsFailed) => AnalyzingErrors,
            (AnalyzingErrors, ErrorsAnalyzed) => CycleLoop,
            (AnalyzingErrors, Halt) => Done,
            (CycleLoop, Halt) => Done,

            (from, event) => {
                return Err(PatchError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LoopState::Idle => "Idle",
            LoopState::RunningInitialTests => "Running initial tests",
            LoopState::AllPassing => "All passing",
            LoopState::AnalyzingErrors => "Analyzing errors",
            LoopState::CycleLoop => "Patch cycles",
            LoopState::Done => "Done",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
