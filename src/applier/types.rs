//! Patch application result types

use crate::classifier::{ErrorType, Severity};
use crate::config::ConfidenceThresholds;
use crate::strategies::{PatchCandidate, StrategyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a patch was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyKind {
    /// File edits were attempted
    Applied,
    /// Advice only, nothing touched
    Suggestion,
}

/// Snapshot of one file taken before a patch edits it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
}

/// Outcome of one patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub success: bool,

    #[serde(rename = "type")]
    pub kind: ApplyKind,

    /// Snapshots taken for this patch; empty for suggestions
    pub backups: Vec<BackupRecord>,

    pub changes_applied: usize,

    pub attempt: u32,

    /// Failure reason
    pub error: Option<String>,

    /// Suggestion text or patch description
    pub message: Option<String>,

    pub strategy: StrategyId,
    pub error_type: ErrorType,
    pub severity: Severity,
    pub confidence: f64,
    pub file: Option<String>,
}

impl ApplyResult {
    fn from_patch(patch: &PatchCandidate, attempt: u32, kind: ApplyKind, success: bool) -> Self {
        Self {
            success,
            kind,
            backups: Vec::new(),
            changes_applied: 0,
            attempt,
            error: None,
            message: None,
            strategy: patch.strategy,
            error_type: patch.error.error_type,
            severity: patch.error.severity,
            confidence: patch.confidence,
            file: patch.error.file.clone(),
        }
    }

    /// Suggestion recorded without touching files
    pub fn suggestion(patch: &PatchCandidate, attempt: u32, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::from_patch(patch, attempt, ApplyKind::Suggestion, true)
        }
    }

    /// Every edit succeeded
    pub fn applied(patch: &PatchCandidate, attempt: u32, backups: Vec<BackupRecord>) -> Self {
        Self {
            backups,
            changes_applied: patch.changes.len(),
            message: patch.description.clone(),
            ..Self::from_patch(patch, attempt, ApplyKind::Applied, true)
        }
    }

    /// Patch rejected or rolled back
    pub fn failed(
        patch: &PatchCandidate,
        attempt: u32,
        backups: Vec<BackupRecord>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            backups,
            error: Some(error.into()),
            message: patch.description.clone(),
            ..Self::from_patch(patch, attempt, ApplyKind::Applied, false)
        }
    }

    /// Needs a human: failed, or suggestion only
    pub fn needs_attention(&self) -> bool {
        !self.success || self.kind == ApplyKind::Suggestion
    }
}

/// Outcome of one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyBatch {
    pub results: Vec<ApplyResult>,

    /// Patches whose result was successful, in input order
    pub applied_patches: Vec<PatchCandidate>,

    pub success_count: usize,
    pub failure_count: usize,
}

/// One line of the patch log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchLogEntry {
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
    pub results: Vec<ApplyResult>,
}

/// Applier switches
#[derive(Debug, Clone, PartialEq)]
pub struct ApplierOptions {
    /// Demote patches under their severity's threshold to suggestions
    pub enforce_thresholds: bool,

    pub thresholds: ConfidenceThresholds,

    /// Run `validate_patch` before snapshotting
    pub validate_before_apply: bool,
}

impl Default for ApplierOptions {
    fn default() -> Self {
        Self {
            enforce_thresholds: true,
            thresholds: ConfidenceThresholds::default(),
            validate_before_apply: true,
        }
    }
}
