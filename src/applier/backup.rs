//! Whole-file snapshots and retention pruning

use crate::applier::types::BackupRecord;
use crate::errors::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Suffix every snapshot carries
pub const BACKUP_EXTENSION: &str = "backup";

/// `<basename>.<ISO8601 with ':' as '-'>.attempt-<n>.backup`
pub fn backup_file_name(original: &Path, at: DateTime<Utc>, attempt: u32) -> String {
    let base = original
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("{}.{}.attempt-{}.{}", base, stamp, attempt, BACKUP_EXTENSION)
}

/// Directory of snapshots
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Open the store, creating the directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `original` into the store
    ///
    /// Two snapshots of the same file within one millisecond get distinct
    /// names by nudging the timestamp forward.
    pub fn snapshot(&self, original: &Path, attempt: u32) -> Result<BackupRecord> {
        let mut at = Utc::now();
        let mut backup_path = self.dir.join(backup_file_name(original, at, attempt));
        while backup_path.exists() {
            at += chrono::Duration::milliseconds(1);
            backup_path = self.dir.join(backup_file_name(original, at, attempt));
        }

        fs::copy(original, &backup_path)?;
        debug!(
            original = %original.display(),
            backup = %backup_path.display(),
            "snapshot taken"
        );

        Ok(BackupRecord {
            original_path: original.to_path_buf(),
            backup_path,
            timestamp: at,
            attempt,
        })
    }

    /// Copy a snapshot back over its original
    pub fn restore(&self, record: &BackupRecord) -> Result<()> {
        fs::copy(&record.backup_path, &record.original_path)?;
        debug!(original = %record.original_path.display(), "snapshot restored");
        Ok(())
    }

    /// Snapshot files currently in the store
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_backup = path
                .extension()
                .map(|ext| ext == BACKUP_EXTENSION)
                .unwrap_or(false);
            if is_backup && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete snapshots modified strictly before `now - days`
    pub fn clean(&self, days: u64) -> Result<usize> {
        self.clean_at(SystemTime::now(), days)
    }

    fn clean_at(&self, now: SystemTime, days: u64) -> Result<usize> {
        let cutoff = now
            .checked_sub(Duration::from_secs(days.saturating_mul(24 * 60 * 60)))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let removed = prune(&self.list()?, cutoff);
        debug!(removed, days, "backup retention pass complete");
        Ok(removed)
    }
}

/// Remove every path last modified strictly before `cutoff`
///
/// An entry that cannot be read or removed is logged and skipped; the pass
/// carries on with the rest.
fn prune(paths: &[PathBuf], cutoff: SystemTime) -> usize {
    let mut removed = 0;
    for path in paths {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read backup metadata, skipping");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "cannot remove backup, skipping"),
        }
    }
    removed
}
