//! Child-process test runner
//!
//! Commands run as argv arrays (no shell) in the project root, with a
//! wall-clock timeout. Output is captured as it arrives, so a run killed at
//! its timeout still reports whatever it printed first.

use crate::config::Config;
use crate::errors::{PatchError, Result};
use crate::runner::types::{RunResult, SuiteSpec};
use crate::runner::TestRunner;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Placeholder replaced by the file path in the single-file command
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Runs configured commands as child processes
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    suites: Vec<SuiteSpec>,
    file_command: Vec<String>,
    suite_timeout: Duration,
    file_timeout: Duration,
    working_dir: PathBuf,
}

impl CommandTestRunner {
    pub fn new(
        suites: Vec<SuiteSpec>,
        file_command: Vec<String>,
        suite_timeout: Duration,
        file_timeout: Duration,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            suites,
            file_command,
            suite_timeout,
            file_timeout,
            working_dir: working_dir.into(),
        }
    }

    /// Runner for a validated config; test timeouts are clamped to the
    /// global `timeout_ms`
    pub fn from_config(config: &Config, project_root: &Path) -> Self {
        let cap = config.timeout_ms;
        Self::new(
            config.tests.suites.clone(),
            config.tests.file_command.clone(),
            Duration::from_millis(config.tests.suite_timeout_ms.min(cap)),
            Duration::from_millis(config.tests.file_timeout_ms.min(cap)),
            project_root,
        )
    }

    /// Single-file argv with `{file}` substituted, or the path appended
    pub fn file_argv(&self, path: &str) -> Vec<String> {
        let mut argv: Vec<String> = self
            .file_command
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, path))
            .collect();
        if !self.file_command.iter().any(|arg| arg.contains(FILE_PLACEHOLDER)) {
            argv.push(path.to_string());
        }
        argv
    }

    async fn run_argv(&self, target: &str, argv: &[String], limit: Duration) -> Result<RunResult> {
        let Some((program, args)) = argv.split_first() else {
            return Err(PatchError::TestRunner(format!(
                "no command configured for {}",
                target
            )));
        };

        let start = Instant::now();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(run = target, command = %argv.join(" "), "running tests");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(run = target, error = %e, "failed to spawn test command");
                return Ok(RunResult::failure(
                    target,
                    format!("Failed to execute {}: {}", program, e),
                    start.elapsed(),
                ));
            }
        };

        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(stream) = child.stdout.take() {
            readers.push(capture(stream, Arc::clone(&stdout)));
        }
        if let Some(stream) = child.stderr.take() {
            readers.push(capture(stream, Arc::clone(&stderr)));
        }

        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => {
                join_all(readers.iter_mut()).await;
                let combined = combine_output(&stdout.lock().await, &stderr.lock().await);
                Ok(RunResult::completed(target, combined, status.code(), start.elapsed()))
            }
            Ok(Err(e)) => {
                warn!(run = target, error = %e, "failed to wait for test command");
                Ok(RunResult::failure(
                    target,
                    format!("Failed to execute {}: {}", program, e),
                    start.elapsed(),
                ))
            }
            Err(_) => {
                warn!(run = target, timeout_ms = limit.as_millis() as u64, "test run timed out");
                if let Err(e) = child.kill().await {
                    debug!(run = target, error = %e, "kill after timeout failed");
                }
                // Descendants may still hold the pipes open
                let _ = timeout(DRAIN_GRACE, join_all(readers.iter_mut())).await;
                for reader in &readers {
                    reader.abort();
                }
                let partial = combine_output(&stdout.lock().await, &stderr.lock().await);
                Ok(RunResult::timeout(target, limit, partial, start.elapsed()))
            }
        }
    }
}

/// How long to keep reading after a timed-out child is killed
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Append everything read from `stream` to `sink` until EOF
fn capture<S>(mut stream: S, sink: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!(error = %e, "test output stream closed");
                    break;
                }
            }
        }
    })
}

/// stdout, then stderr on its own line when present
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    if stderr.is_empty() {
        stdout.into_owned()
    } else {
        format!("{}\n{}", stdout, String::from_utf8_lossy(stderr))
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn run_suite(&self, suite: &str) -> Result<RunResult> {
        let spec = self
            .suites
            .iter()
            .find(|s| s.name == suite)
            .ok_or_else(|| PatchError::TestRunner(format!("unknown suite: {}", suite)))?;
        self.run_argv(suite, &spec.command, self.suite_timeout).await
    }

    async fn run_file(&self, path: &str) -> Result<RunResult> {
        let argv = self.file_argv(path);
        self.run_argv(path, &argv, self.file_timeout).await
    }

    fn suites(&self) -> Vec<String> {
        self.suites.iter().map(|s| s.name.clone()).collect()
    }
}
