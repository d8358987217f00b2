//! Integration tests for the patch cycle loop
//!
//! Drives `PatchOrchestrator` with a scripted in-memory runner, so no child
//! processes are spawned.

use async_trait::async_trait;
use autopatch::{
    applier::{ApplierOptions, PatchApplier},
    classifier::ErrorClassifier,
    orchestrator::{HaltReason, LoopSettings, LoopState, PatchOrchestrator},
    runner::{RunResult, TestRunner},
    session::SessionLog,
    strategies::{
        FileEdit, PatchCandidate, PatchStrategyEngine, StrategyContext, StrategyId, StrategyPlan,
        StrategyRegistry,
    },
    Result,
};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const MISSING_DEFAULT: &str = "The requested module does not provide an export named 'default'";

/// Replays queued results; an empty queue means "passes"
#[derive(Default)]
struct ScriptedRunner {
    suite_runs: Mutex<VecDeque<(bool, String)>>,
    file_runs: Mutex<VecDeque<(bool, String)>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    fn suite(self, success: bool, output: &str) -> Self {
        self.suite_runs.lock().unwrap().push_back((success, output.to_string()));
        self
    }

    fn file(self, success: bool, output: &str) -> Self {
        self.file_runs.lock().unwrap().push_back((success, output.to_string()));
        self
    }

    fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn next(queue: &Mutex<VecDeque<(bool, String)>>, target: &str) -> RunResult {
        let (success, output) = queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((true, "all tests passed".to_string()));
        let exit_code = if success { 0 } else { 1 };
        RunResult::completed(target, output, Some(exit_code), Duration::from_millis(5))
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn run_suite(&self, suite: &str) -> Result<RunResult> {
        self.calls.lock().unwrap().push(format!("suite:{}", suite));
        Ok(Self::next(&self.suite_runs, suite))
    }

    async fn run_file(&self, path: &str) -> Result<RunResult> {
        self.calls.lock().unwrap().push(format!("file:{}", path));
        Ok(Self::next(&self.file_runs, path))
    }

    fn suites(&self) -> Vec<String> {
        vec!["unit".to_string()]
    }
}

fn applier(dir: &Path) -> PatchApplier {
    PatchApplier::new(
        dir.join(".autopatch/backups"),
        dir.join(".autopatch/logs/patches.jsonl"),
        ApplierOptions::default(),
    )
    .unwrap()
}

fn orchestrator_with(
    dir: &Path,
    runner: ScriptedRunner,
    engine: PatchStrategyEngine,
    max_attempts: u32,
) -> PatchOrchestrator<ScriptedRunner> {
    PatchOrchestrator::new(
        runner,
        ErrorClassifier::new().unwrap(),
        engine,
        applier(dir),
        SessionLog::in_memory(),
        LoopSettings {
            max_attempts,
            max_errors_per_cycle: 10,
        },
    )
}

fn orchestrator(dir: &Path, runner: ScriptedRunner, max_attempts: u32) -> PatchOrchestrator<ScriptedRunner> {
    orchestrator_with(dir, runner, PatchStrategyEngine::builtin(dir), max_attempts)
}

fn write_component(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("src/components/Button.tsx");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "export function Button() {\n  return null;\n}\n").unwrap();
    path
}

#[tokio::test]
async fn test_initial_pass_skips_classification() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::default().suite(true, "✓ 12 tests passed");
    let mut orch = orchestrator(dir.path(), runner, 3);

    let outcome = orch.run().await.unwrap();

    assert!(outcome.final_success);
    assert_eq!(outcome.halt_reason, HaltReason::InitialTestsPassed);
    assert!(outcome.cycles.is_empty());
    assert!(outcome.initial_errors.is_empty());
    assert_eq!(orch.state(), LoopState::AllPassing);
}

#[tokio::test]
async fn test_converges_without_consuming_remaining_budget() {
    let dir = TempDir::new().unwrap();
    let component = write_component(dir.path());
    let output = format!("FAIL src/components/Button.tsx\n{}\n", MISSING_DEFAULT);
    let runner = ScriptedRunner::default().suite(false, &output);
    let calls = runner.calls();
    let mut orch = orchestrator(dir.path(), runner, 3);

    let outcome = orch.run().await.unwrap();

    assert!(outcome.final_success);
    assert_eq!(outcome.halt_reason, HaltReason::Converged);
    assert_eq!(outcome.cycles.len(), 1);
    assert_eq!(outcome.total_patches, 1);
    assert_eq!(outcome.successful_patches, 1);
    assert_eq!(outcome.cycles[0].failing_files, vec!["src/components/Button.tsx"]);
    assert!(fs::read_to_string(&component)
        .unwrap()
        .ends_with("export default Button;\n"));
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["suite:unit", "file:src/components/Button.tsx"]
    );
    assert_eq!(orch.state(), LoopState::Done);
}

#[tokio::test]
async fn test_halts_when_no_patch_generated() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::default().suite(false, "FAIL src/a.test.ts\nsomething odd happened\n");
    let calls = runner.calls();
    let mut orch = orchestrator(dir.path(), runner, 3);

    let outcome = orch.run().await.unwrap();

    assert!(!outcome.final_success);
    assert_eq!(outcome.halt_reason, HaltReason::NoPatchesGenerated);
    assert_eq!(outcome.cycles.len(), 1);
    assert_eq!(outcome.total_patches, 0);
    assert_eq!(*calls.lock().unwrap(), vec!["suite:unit"]);
}

#[tokio::test]
async fn test_halts_when_no_patch_applied() {
    let dir = TempDir::new().unwrap();
    let mut registry = StrategyRegistry::empty();
    registry.register(StrategyId::FixDefaultExports, |error, ctx: &StrategyContext| {
        let target = ctx.resolve("src/Missing.tsx");
        Ok(Some(PatchCandidate::with_changes(
            error,
            StrategyId::FixDefaultExports,
            0.9,
            vec![FileEdit::write_file(target, "export default Missing;\n")],
            "Add default export for Missing",
        )))
    });
    let engine = PatchStrategyEngine::new(
        StrategyPlan::builtin(),
        registry,
        StrategyContext::new(dir.path()),
    );
    let output = format!("FAIL src/Missing.tsx\n{}\n", MISSING_DEFAULT);
    let runner = ScriptedRunner::default().suite(false, &output);
    let mut orch = orchestrator_with(dir.path(), runner, engine, 3);

    let outcome = orch.run().await.unwrap();

    assert!(!outcome.final_success);
    assert_eq!(outcome.halt_reason, HaltReason::NoPatchesApplied);
    assert_eq!(outcome.cycles.len(), 1);
    assert_eq!(outcome.successful_patches, 0);
    assert_eq!(outcome.manual_interventions().len(), 1);
    assert!(!dir.path().join("src/Missing.tsx").exists());
}

#[tokio::test]
async fn test_exhausts_attempts_when_errors_persist() {
    let dir = TempDir::new().unwrap();
    let output = "FAIL src/guests.test.ts\nTable 'user' doesn't exist\n";
    let runner = ScriptedRunner::default()
        .suite(false, output)
        .file(false, output)
        .file(false, output)
        .file(false, output);
    let mut orch = orchestrator(dir.path(), runner, 3);

    let outcome = orch.run().await.unwrap();

    assert!(!outcome.final_success);
    assert_eq!(outcome.halt_reason, HaltReason::AttemptsExhausted);
    assert_eq!(outcome.cycles.len(), 3);
    assert_eq!(
        outcome.cycles.iter().map(|c| c.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    // Schema advice is never applied, only suggested
    assert!(outcome
        .patch_results()
        .all(|r| r.strategy == StrategyId::FixTableNames && r.needs_attention()));
    assert_eq!(orch.session().stats().cycles, 3);
}

#[tokio::test]
async fn test_errors_without_files_rerun_every_suite() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::default()
        .suite(false, "  ✕ loads the guest list\nTable 'user' doesn't exist\n")
        .suite(true, "✓ 4 tests passed");
    let calls = runner.calls();
    let mut orch = orchestrator(dir.path(), runner, 3);

    let outcome = orch.run().await.unwrap();

    assert!(outcome.final_success);
    assert!(outcome.cycles[0].failing_files.is_empty());
    assert_eq!(*calls.lock().unwrap(), vec!["suite:unit", "suite:unit"]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::default();
    let calls = runner.calls();
    let flag = Arc::new(AtomicBool::new(false));
    let mut orch = orchestrator(dir.path(), runner, 3).with_cancel_flag(Arc::clone(&flag));
    flag.store(true, Ordering::SeqCst);

    let outcome = orch.run().await.unwrap();

    assert!(!outcome.final_success);
    assert_eq!(outcome.halt_reason, HaltReason::Cancelled);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(orch.state(), LoopState::Done);
}

#[tokio::test]
async fn test_session_events_cover_lifecycle() {
    let dir = TempDir::new().unwrap();
    write_component(dir.path());
    let output = format!("FAIL src/components/Button.tsx\n{}\n", MISSING_DEFAULT);
    let runner = ScriptedRunner::default().suite(false, &output);
    let mut orch = orchestrator(dir.path(), runner, 3);

    orch.run().await.unwrap();

    let names: Vec<&str> = orch.session().events().iter().map(|r| r.event.name()).collect();
    assert_eq!(names.first(), Some(&"session_started"));
    assert_eq!(names.last(), Some(&"session_finished"));
    for expected in [
        "tests_executed",
        "errors_analyzed",
        "patches_generated",
        "patches_applied",
        "cycle_completed",
        "state_changed",
    ] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
}
