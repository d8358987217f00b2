//! Orchestration result types

use crate::applier::ApplyResult;
use crate::classifier::ErrorRecord;
use crate::runner::RunResult;
use crate::strategies::PatchCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    InitialTestsPassed,
    Converged,
    NoPatchesGenerated,
    NoPatchesApplied,
    AttemptsExhausted,
    NoErrorsClassified,
    Cancelled,
}

impl HaltReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HaltReason::InitialTestsPassed => "initial_tests_passed",
            HaltReason::Converged => "converged",
            HaltReason::NoPatchesGenerated => "no_patches_generated",
            HaltReason::NoPatchesApplied => "no_patches_applied",
            HaltReason::AttemptsExhausted => "attempts_exhausted",
            HaltReason::NoErrorsClassified => "no_errors_classified",
            HaltReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loop bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub max_attempts: u32,
    pub max_errors_per_cycle: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_errors_per_cycle: 10,
        }
    }
}

/// Wall-clock spent in each phase of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleTimings {
    pub generate_ms: u64,
    pub apply_ms: u64,
    pub retest_ms: u64,
    pub analyze_ms: u64,
}

/// One generate/apply/retest iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResult {
    pub attempt: u32,

    /// Errors processed this cycle, after truncation
    pub errors: Vec<ErrorRecord>,

    /// Errors left over past the per-cycle cap
    pub deferred_errors: usize,

    pub patches: Vec<PatchCandidate>,

    pub patch_results: Vec<ApplyResult>,

    pub success_count: usize,

    /// Distinct files named by this cycle's errors
    pub failing_files: Vec<String>,

    pub rerun_results: Vec<RunResult>,

    /// Every re-run passed
    pub all_passing: bool,

    pub timings: CycleTimings,
}

impl CycleResult {
    pub fn new(attempt: u32, errors: Vec<ErrorRecord>, deferred_errors: usize) -> Self {
        Self {
            attempt,
            errors,
            deferred_errors,
            patches: Vec::new(),
            patch_results: Vec::new(),
            success_count: 0,
            failing_files: Vec::new(),
            rerun_results: Vec::new(),
            all_passing: false,
            timings: CycleTimings::default(),
        }
    }
}

/// Wall-clock spent in each session phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimings {
    pub initial_tests_ms: u64,
    pub analysis_ms: u64,
    pub cycles_ms: u64,
    pub total_ms: u64,
}

/// Terminal output of the loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cycles: Vec<CycleResult>,
    pub final_success: bool,
    pub total_patches: usize,
    pub successful_patches: usize,
    pub halt_reason: HaltReason,
    pub initial_results: Vec<RunResult>,
    pub initial_errors: Vec<ErrorRecord>,
    pub timings: PhaseTimings,
}

impl SessionOutcome {
    /// Every apply result across all cycles
    pub fn patch_results(&self) -> impl Iterator<Item = &ApplyResult> {
        self.cycles.iter().flat_map(|c| c.patch_results.iter())
    }

    /// Results that were not applied or only advised
    pub fn manual_interventions(&self) -> Vec<&ApplyResult> {
        self.patch_results().filter(|r| r.needs_attention()).collect()
    }
}
