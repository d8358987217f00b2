//! Bounded patch-cycle driver
//!
//! Phases run strictly one after another: tests, classification, patch
//! generation, patch application, targeted re-test. Only the initial suite
//! runs overlap each other. Cancellation is checked between phases and
//! never interrupts a patch.

use crate::applier::PatchApplier;
use crate::classifier::{ErrorClassifier, ErrorRecord};
use crate::errors::Result;
use crate::orchestrator::state::{LoopEvent, LoopState};
use crate::orchestrator::types::{
    CycleResult, HaltReason, LoopSettings, PhaseTimings, SessionOutcome,
};
use crate::runner::{RunResult, TestRunner};
use crate::session::{SessionEvent, SessionLog};
use crate::strategies::PatchStrategyEngine;
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Callback receiving short phase descriptions
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// How a single cycle ended
enum CycleEnd {
    NoPatches,
    NoneApplied,
    Converged,
    Cancelled,
    Continue(Vec<ErrorRecord>),
}

/// Drives test → classify → patch → retest cycles
pub struct PatchOrchestrator<R: TestRunner> {
    runner: R,
    classifier: ErrorClassifier,
    engine: PatchStrategyEngine,
    applier: PatchApplier,
    session: SessionLog,
    settings: LoopSettings,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressFn>,
    state: LoopState,
}

impl<R: TestRunner> PatchOrchestrator<R> {
    pub fn new(
        runner: R,
        classifier: ErrorClassifier,
        engine: PatchStrategyEngine,
        applier: PatchApplier,
        session: SessionLog,
        settings: LoopSettings,
    ) -> Self {
        Self {
            runner,
            classifier,
            engine,
            applier,
            session,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
            state: LoopState::Idle,
        }
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &SessionLog {
        &self.session
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn report_progress(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    fn transition(&mut self, event: LoopEvent) -> Result<()> {
        let next = self.state.transition(event)?;
        if next != self.state {
            info!(from = %self.state, to = %next, "loop state changed");
            self.session.record(SessionEvent::StateChanged {
                from: self.state.to_string(),
                to: next.to_string(),
            })?;
        }
        self.state = next;
        Ok(())
    }

    /// Run the whole session
    ///
    /// A failed convergence is a normal outcome. Only infrastructure faults
    /// (runner errors, log writes) are returned as `Err`.
    pub async fn run(&mut self) -> Result<SessionOutcome> {
        let started = Instant::now();
        let started_at = Utc::now();
        let mut timings = PhaseTimings::default();

        self.session.record(SessionEvent::SessionStarted {
            max_attempts: self.settings.max_attempts,
            suites: self.runner.suites(),
        })?;
        self.transition(LoopEvent::Start)?;

        let mut outcome = SessionOutcome {
            session_id: self.session.session_id(),
            started_at,
            finished_at: started_at,
            cycles: Vec::new(),
            final_success: false,
            total_patches: 0,
            successful_patches: 0,
            halt_reason: HaltReason::Cancelled,
            initial_results: Vec::new(),
            initial_errors: Vec::new(),
            timings,
        };

        if self.cancelled() {
            return self.finish(outcome, HaltReason::Cancelled, started);
        }

        self.report_progress("Running test suites");
        let phase = Instant::now();
        outcome.initial_results = self.run_all_suites().await?;
        timings.initial_tests_ms = phase.elapsed().as_millis() as u64;
        self.record_tests("initial", 0, &outcome.initial_results, timings.initial_tests_ms)?;

        if outcome.initial_results.iter().all(|r| r.success) {
            self.transition(LoopEvent::InitialTestsPassed)?;
            outcome.final_success = true;
            outcome.timings = timings;
            return self.finish(outcome, HaltReason::InitialTestsPassed, started);
        }
        self.transition(LoopEvent::InitialTestsFailed)?;

        if self.cancelled() {
            outcome.timings = timings;
            return self.finish(outcome, HaltReason::Cancelled, started);
        }

        self.report_progress("Analyzing errors");
        let phase = Instant::now();
        let mut current_errors = self.classify(&outcome.initial_results);
        timings.analysis_ms = phase.elapsed().as_millis() as u64;
        self.session.record(SessionEvent::ErrorsAnalyzed {
            attempt: 0,
            summary: self.classifier.generate_summary(&current_errors),
        })?;
        outcome.initial_errors = current_errors.clone();

        if current_errors.is_empty() {
            self.transition(LoopEvent::Halt)?;
            outcome.timings = timings;
            return self.finish(outcome, HaltReason::NoErrorsClassified, started);
        }
        self.transition(LoopEvent::ErrorsAnalyzed)?;

        let cycles_started = Instant::now();
        let mut halt = HaltReason::AttemptsExhausted;

        for attempt in 1..=self.settings.max_attempts {
            if current_errors.is_empty() {
                halt = HaltReason::NoErrorsClassified;
                break;
            }
            if self.cancelled() {
                halt = HaltReason::Cancelled;
                break;
            }

            let (cycle, end) = self.run_cycle(attempt, &current_errors).await?;
            outcome.total_patches += cycle.patches.len();
            outcome.successful_patches += cycle.success_count;
            outcome.cycles.push(cycle);

            match end {
                CycleEnd::NoPatches => {
                    halt = HaltReason::NoPatchesGenerated;
                    break;
                }
                CycleEnd::NoneApplied => {
                    halt = HaltReason::NoPatchesApplied;
                    break;
                }
                CycleEnd::Converged => {
                    outcome.final_success = true;
                    halt = HaltReason::Converged;
                    break;
                }
                CycleEnd::Cancelled => {
                    halt = HaltReason::Cancelled;
                    break;
                }
                CycleEnd::Continue(next_errors) => current_errors = next_errors,
            }
        }

        timings.cycles_ms = cycles_started.elapsed().as_millis() as u64;
        outcome.timings = timings;

        let event = if halt == HaltReason::Cancelled {
            LoopEvent::Cancel
        } else {
            LoopEvent::Halt
        };
        self.transition(event)?;
        self.finish(outcome, halt, started)
    }

    async fn run_cycle(&mut self, attempt: u32, errors: &[ErrorRecord]) -> Result<(CycleResult, CycleEnd)> {
        let take = errors.len().min(self.settings.max_errors_per_cycle);
        let mut cycle = CycleResult::new(attempt, errors[..take].to_vec(), errors.len() - take);
        info!(
            attempt,
            errors = take,
            deferred = cycle.deferred_errors,
            "starting patch cycle"
        );

        self.report_progress(&format!("Cycle {}: generating patches", attempt));
        let phase = Instant::now();
        cycle.patches = self.engine.generate_patches(&cycle.errors);
        cycle.timings.generate_ms = phase.elapsed().as_millis() as u64;
        self.session.record(SessionEvent::PatchesGenerated {
            attempt,
            count: cycle.patches.len(),
        })?;

        if cycle.patches.is_empty() {
            warn!(attempt, "no patches generated, halting");
            self.record_cycle(&cycle)?;
            return Ok((cycle, CycleEnd::NoPatches));
        }
        if self.cancelled() {
            self.record_cycle(&cycle)?;
            return Ok((cycle, CycleEnd::Cancelled));
        }

        self.report_progress(&format!("Cycle {}: applying {} patches", attempt, cycle.patches.len()));
        let phase = Instant::now();
        let batch = self.applier.apply_patches(&cycle.patches, attempt)?;
        cycle.timings.apply_ms = phase.elapsed().as_millis() as u64;
        cycle.success_count = batch.success_count;
        cycle.patch_results = batch.results;
        self.session.record(SessionEvent::PatchesApplied {
            attempt,
            succeeded: batch.success_count,
            failed: batch.failure_count,
        })?;

        if cycle.success_count == 0 {
            warn!(attempt, "no patch applied successfully, halting");
            self.record_cycle(&cycle)?;
            return Ok((cycle, CycleEnd::NoneApplied));
        }
        if self.cancelled() {
            self.record_cycle(&cycle)?;
            return Ok((cycle, CycleEnd::Cancelled));
        }

        cycle.failing_files = distinct_files(&cycle.errors);
        self.report_progress(&format!("Cycle {}: re-running tests", attempt));
        let phase = Instant::now();
        cycle.rerun_results = if cycle.failing_files.is_empty() {
            self.run_all_suites().await?
        } else {
            let mut results = Vec::with_capacity(cycle.failing_files.len());
            for file in &cycle.failing_files {
                results.push(self.runner.run_file(file).await?);
            }
            results
        };
        cycle.timings.retest_ms = phase.elapsed().as_millis() as u64;
        self.record_tests("retest", attempt, &cycle.rerun_results, cycle.timings.retest_ms)?;

        cycle.all_passing = cycle.rerun_results.iter().all(|r| r.success);
        if cycle.all_passing {
            info!(attempt, "all affected tests pass");
            self.record_cycle(&cycle)?;
            return Ok((cycle, CycleEnd::Converged));
        }

        let phase = Instant::now();
        let next_errors = self.classify(&cycle.rerun_results);
        cycle.timings.analyze_ms = phase.elapsed().as_millis() as u64;
        self.session.record(SessionEvent::ErrorsAnalyzed {
            attempt,
            summary: self.classifier.generate_summary(&next_errors),
        })?;
        self.record_cycle(&cycle)?;

        Ok((cycle, CycleEnd::Continue(next_errors)))
    }

    async fn run_all_suites(&self) -> Result<Vec<RunResult>> {
        let suites = self.runner.suites();
        let runs = suites.iter().map(|suite| self.runner.run_suite(suite));
        join_all(runs).await.into_iter().collect()
    }

    /// Classify the combined output of every failed run
    fn classify(&self, results: &[RunResult]) -> Vec<ErrorRecord> {
        let combined = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.output.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.classifier.analyze(&combined)
    }

    fn record_tests(&self, phase: &str, attempt: u32, results: &[RunResult], duration_ms: u64) -> Result<()> {
        let passed = results.iter().filter(|r| r.success).count();
        self.session.record(SessionEvent::TestsExecuted {
            phase: phase.to_string(),
            attempt,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
        })
    }

    fn record_cycle(&self, cycle: &CycleResult) -> Result<()> {
        self.session.record(SessionEvent::CycleCompleted {
            attempt: cycle.attempt,
            errors: cycle.errors.len(),
            patches: cycle.patches.len(),
            successful_patches: cycle.success_count,
            all_passing: cycle.all_passing,
        })
    }

    fn finish(&mut self, mut outcome: SessionOutcome, halt: HaltReason, started: Instant) -> Result<SessionOutcome> {
        if halt == HaltReason::Cancelled {
            self.transition(LoopEvent::Cancel)?;
        }
        outcome.halt_reason = halt;
        outcome.finished_at = Utc::now();
        outcome.timings.total_ms = started.elapsed().as_millis() as u64;

        self.session.record(SessionEvent::SessionFinished {
            final_success: outcome.final_success,
            cycles: outcome.cycles.len(),
            total_patches: outcome.total_patches,
            successful_patches: outcome.successful_patches,
            halt_reason: halt.to_string(),
        })?;
        info!(
            final_success = outcome.final_success,
            cycles = outcome.cycles.len(),
            halt = %halt,
            "session finished"
        );
        Ok(outcome)
    }
}

/// Distinct non-empty files, first-seen order
pub fn distinct_files(errors: &[ErrorRecord]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for file in errors.iter().filter_map(|e| e.file.as_ref()) {
        if !files.contains(file) {
            files.push(file.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_files_first_seen_order() {
        let errors = vec![
            ErrorRecord::new("FAIL b.ts", Some("b.ts".into())),
            ErrorRecord::new("FAIL x", None),
            ErrorRecord::new("FAIL a.ts", Some("a.ts".into())),
            ErrorRecord::new("FAIL b.ts again", Some("b.ts".into())),
        ];
        assert_eq!(distinct_files(&errors), vec!["b.ts", "a.ts"]);
    }
}
