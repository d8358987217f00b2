//! Test run types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one suite or single-file run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Suite name or file path that was run
    pub target: String,

    pub success: bool,

    /// stdout followed by stderr
    pub output: String,

    /// `None` when the process never exited normally
    pub exit_code: Option<i32>,

    pub duration_ms: u64,

    /// Killed after exceeding its timeout
    #[serde(default)]
    pub timed_out: bool,
}

impl RunResult {
    /// Process ran to completion
    pub fn completed(target: impl Into<String>, output: String, exit_code: Option<i32>, duration: Duration) -> Self {
        Self {
            target: target.into(),
            success: exit_code == Some(0),
            output,
            exit_code,
            duration_ms: duration.as_millis() as u64,
            timed_out: false,
        }
    }

    /// Spawn error or similar; reported as a failing run
    pub fn failure(target: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            target: target.into(),
            success: false,
            output: message.into(),
            exit_code: None,
            duration_ms: duration.as_millis() as u64,
            timed_out: false,
        }
    }

    /// Forcibly terminated; `partial` is whatever the run printed first
    pub fn timeout(target: impl Into<String>, limit: Duration, partial: String, duration: Duration) -> Self {
        let mut message = format!("Test run timed out after {}ms", limit.as_millis());
        if !partial.trim().is_empty() {
            message.push('\n');
            message.push_str(&partial);
        }
        Self {
            timed_out: true,
            ..Self::failure(target, message, duration)
        }
    }
}

/// Named suite and its argv
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSpec {
    pub name: String,
    pub command: Vec<String>,
}

impl SuiteSpec {
    pub fn new(name: impl Into<String>, command: &[&str]) -> Self {
        Self {
            name: name.into(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }
}
