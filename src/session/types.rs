//! Session event types

use crate::classifier::ErrorSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle events written to the session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        max_attempts: u32,
        suites: Vec<String>,
    },
    TestsExecuted {
        /// `initial` or `retest`
        phase: String,
        attempt: u32,
        total: usize,
        passed: usize,
        failed: usize,
        duration_ms: u64,
    },
    ErrorsAnalyzed {
        attempt: u32,
        summary: ErrorSummary,
    },
    PatchesGenerated {
        attempt: u32,
        count: usize,
    },
    PatchesApplied {
        attempt: u32,
        succeeded: usize,
        failed: usize,
    },
    CycleCompleted {
        attempt: u32,
        errors: usize,
        patches: usize,
        successful_patches: usize,
        all_passing: bool,
    },
    StateChanged {
        from: String,
        to: String,
    },
    SessionFinished {
        final_success: bool,
        cycles: usize,
        total_patches: usize,
        successful_patches: usize,
        halt_reason: String,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "session_started",
            SessionEvent::TestsExecuted { .. } => "tests_executed",
            SessionEvent::ErrorsAnalyzed { .. } => "errors_analyzed",
            SessionEvent::PatchesGenerated { .. } => "patches_generated",
            SessionEvent::PatchesApplied { .. } => "patches_applied",
            SessionEvent::CycleCompleted { .. } => "cycle_completed",
            SessionEvent::StateChanged { .. } => "state_changed",
            SessionEvent::SessionFinished { .. } => "session_finished",
        }
    }
}

/// One line of `session.jsonl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
    #[serde(flatten)]
    pub event: SessionEvent,
}

/// Running tallies over recorded events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub test_runs: usize,
    pub errors_analyzed: usize,
    pub patches_generated: usize,
    pub patches_applied: usize,
    pub patches_failed: usize,
    pub cycles: usize,
    pub state_changes: usize,
}
