//! Append-only session event log

use crate::errors::Result;
use crate::session::types::{SessionEvent, SessionRecord, SessionStats};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Session event collector
///
/// Clones share the same event buffer and stats. When a path is set every
/// event is also appended to it as one JSON line.
#[derive(Debug, Clone)]
pub struct SessionLog {
    session_id: Uuid,
    path: Option<PathBuf>,
    events: Arc<Mutex<Vec<SessionRecord>>>,
    stats: Arc<Mutex<SessionStats>>,
}

impl SessionLog {
    /// Log backed by a JSON-lines file; creates the parent directory
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::with_path(Some(path)))
    }

    /// Memory-only log
    pub fn in_memory() -> Self {
        Self::with_path(None)
    }

    fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            path,
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(SessionStats::default())),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event; a failed file append is returned to the caller
    pub fn record(&self, event: SessionEvent) -> Result<()> {
        let record = SessionRecord {
            timestamp: Utc::now(),
            session_id: self.session_id,
            event,
        };

        if let Some(path) = &self.path {
            let line = serde_json::to_string(&record)?;
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}", line)?;
        }

        debug!(event = record.event.name(), "session event");
        self.update_stats(&record.event);

        if let Ok(mut events) = self.events.lock() {
            events.push(record);
        }
        Ok(())
    }

    fn update_stats(&self, event: &SessionEvent) {
        let Ok(mut stats) = self.stats.lock() else {
            return;
        };
        match event {
            SessionEvent::TestsExecuted { total, .. } => stats.test_runs += total,
            SessionEvent::ErrorsAnalyzed { summary, .. } => stats.errors_analyzed += summary.total,
            SessionEvent::PatchesGenerated { count, .. } => stats.patches_generated += count,
            SessionEvent::PatchesApplied {
                succeeded, failed, ..
            } => {
                stats.patches_applied += succeeded;
                stats.patches_failed += failed;
            }
            SessionEvent::CycleCompleted { .. } => stats.cycles += 1,
            SessionEvent::StateChanged { .. } => stats.state_changes += 1,
            SessionEvent::SessionStarted { .. } | SessionEvent::SessionFinished { .. } => {}
        }
    }

    /// Snapshot of the tallies
    pub fn stats(&self) -> SessionStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<SessionRecord> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}
