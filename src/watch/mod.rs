//! Continuous watch mode
//!
//! Follows a long-running test watcher, cuts its output into batches and
//! runs classify → generate → apply on each batch. There is no bounded
//! cycle loop and no report; every batch is one more attempt.

use crate::applier::{ApplyBatch, PatchApplier};
use crate::classifier::ErrorClassifier;
use crate::errors::{PatchError, Result};
use crate::session::{SessionEvent, SessionLog};
use crate::strategies::PatchStrategyEngine;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lines that close a watcher run (vitest and jest summaries)
const COMPLETION_MARKERS: &str =
    r"^\s*(?:Test Files\s|Tests:\s|Test Suites:\s|Waiting for file changes|Watching for file changes|Watch Usage)";

/// Accumulates watcher output into batches
#[derive(Debug)]
pub struct BatchCollector {
    buffer: Vec<String>,
    marker: Regex,
}

impl BatchCollector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            buffer: Vec::new(),
            marker: Regex::new(COMPLETION_MARKERS)?,
        })
    }

    /// Add one line; returns the finished batch when it closes a run
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        self.buffer.push(line.to_string());
        if self.marker.is_match(line) {
            self.flush()
        } else {
            None
        }
    }

    /// Take whatever has been buffered
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer).join("\n"))
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// What one batch produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// `None` when the batch had no classified errors
    pub attempt: Option<u32>,
    pub errors: usize,
    pub patches: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Running totals across batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub batches: usize,
    pub errors: usize,
    pub patches: usize,
    pub succeeded: usize,
}

/// Patch pipeline driven by watcher batches
pub struct WatchSession {
    classifier: ErrorClassifier,
    engine: PatchStrategyEngine,
    applier: PatchApplier,
    session: SessionLog,
    next_attempt: u32,
    stats: WatchStats,
}

impl WatchSession {
    pub fn new(
        classifier: ErrorClassifier,
        engine: PatchStrategyEngine,
        applier: PatchApplier,
        session: SessionLog,
    ) -> Self {
        Self {
            classifier,
            engine,
            applier,
            session,
            next_attempt: 1,
            stats: WatchStats::default(),
        }
    }

    pub fn stats(&self) -> WatchStats {
        self.stats
    }

    /// Attempt number the next patched batch will use
    pub fn next_attempt(&self) -> u32 {
        self.next_attempt
    }

    /// Classify one batch and patch what it finds
    pub fn process_batch(&mut self, output: &str) -> Result<BatchReport> {
        self.stats.batches += 1;

        let errors = self.classifier.analyze(output);
        if errors.is_empty() {
            debug!("watch batch had no classified errors");
            return Ok(BatchReport::default());
        }

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        self.session.record(SessionEvent::ErrorsAnalyzed {
            attempt,
            summary: self.classifier.generate_summary(&errors),
        })?;

        let patches = self.engine.generate_patches(&errors);
        self.session.record(SessionEvent::PatchesGenerated {
            attempt,
            count: patches.len(),
        })?;

        let batch = if patches.is_empty() {
            ApplyBatch::default()
        } else {
            self.applier.apply_patches(&patches, attempt)?
        };
        self.session.record(SessionEvent::PatchesApplied {
            attempt,
            succeeded: batch.success_count,
            failed: batch.failure_count,
        })?;

        self.stats.errors += errors.len();
        self.stats.patches += patches.len();
        self.stats.succeeded += batch.success_count;

        info!(
            attempt,
            errors = errors.len(),
            patches = patches.len(),
            succeeded = batch.success_count,
            "watch batch processed"
        );

        Ok(BatchReport {
            attempt: Some(attempt),
            errors: errors.len(),
            patches: patches.len(),
            succeeded: batch.success_count,
            failed: batch.failure_count,
        })
    }

    /// Spawn the watcher and process batches until it exits or `cancel` is set
    pub async fn run(
        &mut self,
        command: &[String],
        working_dir: impl Into<PathBuf>,
        debounce: Duration,
        cancel: Arc<AtomicBool>,
    ) -> Result<WatchStats> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| PatchError::Config("watch command is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir.into())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PatchError::TestRunner(format!("Failed to spawn '{}': {}", program, e)))?;
        info!(command = %command.join(" "), "watching test output");

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone());
        }
        drop(tx);

        let mut collector = BatchCollector::new()?;
        // Poll the cancel flag even while the watcher is quiet
        let tick = poll_interval(debounce);
        let mut idle = Duration::ZERO;

        loop {
            if cancel.load(Ordering::SeqCst) {
                info!("watch cancelled");
                break;
            }

            match timeout(tick, rx.recv()).await {
                Ok(Some(line)) => {
                    idle = Duration::ZERO;
                    if let Some(batch) = collector.push_line(&line) {
                        self.process_batch(&batch)?;
                    }
                }
                Ok(None) => {
                    if let Some(batch) = collector.flush() {
                        self.process_batch(&batch)?;
                    }
                    warn!("watch process output closed");
                    break;
                }
                Err(_) => {
                    idle += tick;
                    if idle >= debounce && !collector.is_empty() {
                        idle = Duration::ZERO;
                        if let Some(batch) = collector.flush() {
                            self.process_batch(&batch)?;
                        }
                    }
                }
            }
        }

        if let Err(e) = child.start_kill() {
            debug!(error = %e, "watch process already exited");
        }
        Ok(self.stats)
    }
}

/// How often the run loop wakes while waiting for output: never longer than
/// the debounce, never a busy spin
fn poll_interval(debounce: Duration) -> Duration {
    debounce.clamp(Duration::from_millis(10), Duration::from_millis(250))
}

fn forward_lines<S>(stream: S, tx: mpsc::UnboundedSender<String>)
where
    S: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::ApplierOptions;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> WatchSession {
        let applier = PatchApplier::new(
            dir.path().join("backups"),
            dir.path().join("logs/patches.jsonl"),
            ApplierOptions::default(),
        )
        .unwrap();
        WatchSession::new(
            ErrorClassifier::new().unwrap(),
            PatchStrategyEngine::builtin(dir.path()),
            applier,
            SessionLog::in_memory(),
        )
    }

    #[test]
    fn test_collector_flushes_on_summary_line() {
        let mut collector = BatchCollector::new().unwrap();
        assert!(collector.push_line("FAIL src/a.test.ts").is_none());
        assert!(collector.push_line("Table 'user' doesn't exist").is_none());

        let batch = collector.push_line(" Test Files  1 failed (1)").unwrap();
        assert_eq!(batch.lines().count(), 3);
        assert!(collector.is_empty());
        assert!(collector.flush().is_none());
    }

    #[test]
    fn test_collector_manual_flush() {
        let mut collector = BatchCollector::new().unwrap();
        collector.push_line("partial output");
        assert_eq!(collector.flush().as_deref(), Some("partial output"));
    }

    #[test]
    fn test_clean_batch_consumes_no_attempt() {
        let dir = TempDir::new().unwrap();
        let mut watch = session(&dir);

        let report = watch.process_batch(" ✓ src/a.test.ts (3 tests)\n Test Files  1 passed (1)").unwrap();
        assert_eq!(report, BatchReport::default());
        assert_eq!(watch.next_attempt(), 1);
        assert_eq!(watch.stats().batches, 1);
    }

    #[test]
    fn test_failing_batch_is_patched_with_incrementing_attempts() {
        let dir = TempDir::new().unwrap();
        let mut watch = session(&dir);
        let output = "FAIL src/x.test.ts\nTable 'user' doesn't exist\n";

        let first = watch.process_batch(output).unwrap();
        assert_eq!(first.attempt, Some(1));
        assert_eq!(first.errors, 1);
        assert_eq!(first.patches, 1);
        assert_eq!(first.succeeded, 1);

        let second = watch.process_batch(output).unwrap();
        assert_eq!(second.attempt, Some(2));
        assert_eq!(watch.stats().patches, 2);
        assert!(dir.path().join("logs/patches.jsonl").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_processes_until_stream_closes() {
        let dir = TempDir::new().unwrap();
        let mut watch = session(&dir);
        let output = dir.path().join("watch.out");
        std::fs::write(
            &output,
            "FAIL src/x.test.ts\nTable 'user' doesn't exist\n Test Files  1 failed (1)\n",
        )
        .unwrap();
        let command = vec!["cat".to_string(), output.display().to_string()];

        let stats = watch
            .run(
                &command,
                dir.path(),
                Duration::from_millis(100),
                Arc::new(AtomicBool::new(false)),
            )
            .await
            .unwrap();

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let dir = TempDir::new().unwrap();
        let mut watch = session(&dir);
        let result = watch
            .run(&[], dir.path(), Duration::from_millis(10), Arc::new(AtomicBool::new(false)))
            .await;
        assert!(matches!(result, Err(PatchError::Config(_))));
    }

    #[test]
    fn test_poll_interval_bounds() {
        assert_eq!(poll_interval(Duration::ZERO), Duration::from_millis(10));
        assert_eq!(poll_interval(Duration::from_millis(100)), Duration::from_millis(100));
        assert_eq!(poll_interval(Duration::from_secs(2)), Duration::from_millis(250));
    }
}
