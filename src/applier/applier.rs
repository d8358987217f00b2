//! Transactional per-patch application
//!
//! Patches run strictly in order. Each patch snapshots its existing
//! targets, applies its edits in order, and on the first failing edit
//! copies every snapshot back before recording the failure. One patch
//! failing never stops the batch.

use crate::applier::backup::BackupStore;
use crate::applier::types::{ApplierOptions, ApplyBatch, ApplyResult, BackupRecord, PatchLogEntry};
use crate::applier::validate::validate_patch;
use crate::errors::Result;
use crate::strategies::text::{join_lines, split_lines};
use crate::strategies::{EditOperation, FileEdit, PatchCandidate, ReplacePattern, ReplaceSpec};
use chrono::Utc;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Applies patches with snapshot/restore and an append-only log
#[derive(Debug, Clone)]
pub struct PatchApplier {
    backups: BackupStore,
    log_path: PathBuf,
    options: ApplierOptions,
}

impl PatchApplier {
    /// Create the backup directory and the log's parent directory
    pub fn new(
        backup_dir: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
        options: ApplierOptions,
    ) -> Result<Self> {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            backups: BackupStore::new(backup_dir)?,
            log_path,
            options,
        })
    }

    pub fn backup_store(&self) -> &BackupStore {
        &self.backups
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Apply a prioritized batch, then append one log line for it
    ///
    /// Only a log write failure is returned as an error.
    pub fn apply_patches(&self, patches: &[PatchCandidate], attempt: u32) -> Result<ApplyBatch> {
        let mut batch = ApplyBatch::default();

        for patch in patches {
            let result = self.apply_patch(patch, attempt);
            if result.success {
                batch.success_count += 1;
                batch.applied_patches.push(patch.clone());
            } else {
                batch.failure_count += 1;
            }
            batch.results.push(result);
        }

        self.append_log(attempt, &batch.results)?;

        info!(
            attempt,
            succeeded = batch.success_count,
            failed = batch.failure_count,
            "patch batch applied"
        );
        Ok(batch)
    }

    /// Apply one patch; never panics, never propagates
    pub fn apply_patch(&self, patch: &PatchCandidate, attempt: u32) -> ApplyResult {
        if patch.is_suggestion_only() {
            return ApplyResult::suggestion(patch, attempt, patch.summary());
        }

        if self.options.enforce_thresholds {
            let threshold = self.options.thresholds.threshold(patch.error.severity);
            if patch.confidence < threshold {
                debug!(
                    strategy = %patch.strategy,
                    confidence = patch.confidence,
                    threshold,
                    "confidence below threshold, demoted to suggestion"
                );
                return ApplyResult::suggestion(
                    patch,
                    attempt,
                    format!(
                        "Not applied: confidence {:.2} is below the {} threshold {:.2}. {}",
                        patch.confidence,
                        patch.error.severity,
                        threshold,
                        patch.summary()
                    ),
                );
            }
        }

        if self.options.validate_before_apply {
            if let Err(e) = validate_patch(patch) {
                warn!(strategy = %patch.strategy, error = %e, "patch rejected by validation");
                return ApplyResult::failed(patch, attempt, Vec::new(), e.to_string());
            }
        }

        let backups = match self.snapshot_targets(patch, attempt) {
            Ok(backups) => backups,
            Err(e) => {
                warn!(strategy = %patch.strategy, error = %e, "snapshot failed, patch skipped");
                return ApplyResult::failed(patch, attempt, Vec::new(), e.to_string());
            }
        };

        for (idx, edit) in patch.changes.iter().enumerate() {
            if let Err(e) = apply_edit(edit) {
                warn!(
                    strategy = %patch.strategy,
                    edit = idx + 1,
                    file = %edit.file.display(),
                    error = %e,
                    "edit failed, restoring snapshots"
                );
                self.restore_all(&backups);
                return ApplyResult::failed(patch, attempt, backups, e.to_string());
            }
        }

        debug!(strategy = %patch.strategy, edits = patch.changes.len(), "patch applied");
        ApplyResult::applied(patch, attempt, backups)
    }

    /// Delete snapshots older than `days`
    pub fn clean_backups(&self, days: u64) -> Result<usize> {
        self.backups.clean(days)
    }

    /// One snapshot per distinct target that exists
    fn snapshot_targets(&self, patch: &PatchCandidate, attempt: u32) -> Result<Vec<BackupRecord>> {
        let mut seen: Vec<&Path> = Vec::new();
        let mut backups = Vec::new();

        for edit in &patch.changes {
            let target = edit.file.as_path();
            if seen.contains(&target) {
                continue;
            }
            seen.push(target);
            if target.is_file() {
                backups.push(self.backups.snapshot(target, attempt)?);
            }
        }

        Ok(backups)
    }

    fn restore_all(&self, backups: &[BackupRecord]) {
        for record in backups {
            if let Err(e) = self.backups.restore(record) {
                error!(
                    original = %record.original_path.display(),
                    backup = %record.backup_path.display(),
                    error = %e,
                    "failed to restore snapshot"
                );
            }
        }
    }

    fn append_log(&self, attempt: u32, results: &[ApplyResult]) -> Result<()> {
        let entry = PatchLogEntry {
            timestamp: Utc::now(),
            attempt,
            results: results.to_vec(),
        };
        let line = serde_json::to_string(&entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Apply one edit to disk
pub fn apply_edit(edit: &FileEdit) -> Result<()> {
    match edit.operation()? {
        EditOperation::WriteFile { content } => {
            fs::write(&edit.file, content)?;
        }
        EditOperation::Insert { at, content } => {
            let text = fs::read_to_string(&edit.file)?;
            let mut lines = split_lines(&text);
            let idx = at.min(lines.len());
            lines.insert(idx, content.to_string());
            fs::write(&edit.file, join_lines(&lines))?;
        }
        EditOperation::Replace(spec) => {
            let text = fs::read_to_string(&edit.file)?;
            fs::write(&edit.file, replace_text(&text, spec)?)?;
        }
    }
    Ok(())
}

/// Literal or regex replacement, first occurrence unless `global`
pub fn replace_text(text: &str, spec: &ReplaceSpec) -> Result<String> {
    let replaced = match &spec.from {
        ReplacePattern::Literal(from) if spec.global => text.replace(from.as_str(), &spec.to),
        ReplacePattern::Literal(from) => text.replacen(from.as_str(), &spec.to, 1),
        ReplacePattern::Regex(pattern) => {
            let re = Regex::new(pattern)?;
            if spec.global {
                re.replace_all(text, spec.to.as_str()).into_owned()
            } else {
                re.replace(text, spec.to.as_str()).into_owned()
            }
        }
    };
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::types::ApplyKind;
    use crate::classifier::{ErrorRecord, ErrorType};
    use crate::config::ConfidenceThresholds;
    use crate::strategies::StrategyId;
    use tempfile::TempDir;

    fn options(enforce: bool, validate: bool) -> ApplierOptions {
        ApplierOptions {
            enforce_thresholds: enforce,
            thresholds: ConfidenceThresholds::default(),
            validate_before_apply: validate,
        }
    }

    fn applier(dir: &TempDir, opts: ApplierOptions) -> PatchApplier {
        PatchApplier::new(
            dir.path().join(".autopatch/backups"),
            dir.path().join(".autopatch/logs/patches.jsonl"),
            opts,
        )
        .unwrap()
    }

    fn import_patch(changes: Vec<FileEdit>, confidence: f64) -> PatchCandidate {
        let mut error = ErrorRecord::new("FAIL a.ts", Some("a.ts".into()));
        error.classify(ErrorType::Import, vec!["x".into()], "Cannot find module 'x'");
        PatchCandidate::with_changes(&error, StrategyId::FixMissingImports, confidence, changes, "fix")
    }

    #[test]
    fn test_suggestion_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let applier = applier(&dir, options(true, true));
        let mut error = ErrorRecord::new("FAIL src/x.test.ts", Some("src/x.test.ts".into()));
        error.classify(ErrorType::Database, vec!["user".into()], "Table 'user' doesn't exist");
        let patch = PatchCandidate::suggestion(
            &error,
            StrategyId::FixTableNames,
            0.6,
            "Consider using table name 'users' instead of 'user'",
        );

        let batch = applier.apply_patches(&[patch], 1).unwrap();
        let result = &batch.results[0];
        assert!(result.success);
        assert_eq!(result.kind, ApplyKind::Suggestion);
        assert!(result.backups.is_empty());
        assert_eq!(
            result.message.as_deref(),
            Some("Consider using table name 'users' instead of 'user'")
        );
        assert!(applier.backup_store().list().unwrap().is_empty());
    }

    #[test]
    fn test_applied_patch_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "line1\nline2\n").unwrap();
        let applier = applier(&dir, options(true, true));

        let patch = import_patch(vec![FileEdit::insert(&file, 1, "import x from 'x';")], 0.9);
        let batch = applier.apply_patches(&[patch], 2).unwrap();

        assert_eq!(batch.success_count, 1);
        assert_eq!(batch.applied_patches.len(), 1);
        let result = &batch.results[0];
        assert_eq!(result.kind, ApplyKind::Applied);
        assert_eq!(result.changes_applied, 1);
        assert_eq!(result.backups.len(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "line1\nimport x from 'x';\nline2\n");
        assert_eq!(fs::read_to_string(&result.backups[0].backup_path).unwrap(), "line1\nline2\n");
    }

    #[test]
    fn test_failed_edit_restores_and_batch_continues() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.ts");
        let other = dir.path().join("other.ts");
        fs::write(&first, "original").unwrap();
        fs::write(&other, "keep").unwrap();
        let applier = applier(&dir, options(false, false));

        let broken = import_patch(
            vec![
                FileEdit::write_file(&first, "changed"),
                FileEdit::insert(dir.path().join("missing.ts"), 0, "x"),
            ],
            0.9,
        );
        let fine = import_patch(
            vec![FileEdit::replace(&other, ReplacePattern::Literal("keep".into()), "kept", false)],
            0.9,
        );

        let batch = applier.apply_patches(&[broken, fine], 1).unwrap();
        assert_eq!(batch.failure_count, 1);
        assert_eq!(batch.success_count, 1);
        assert!(!batch.results[0].success);
        assert!(batch.results[0].error.is_some());
        assert_eq!(fs::read_to_string(&first).unwrap(), "original");
        assert_eq!(fs::read_to_string(&other).unwrap(), "kept");
    }

    #[test]
    fn test_below_threshold_demoted() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "x").unwrap();
        let patch = import_patch(vec![FileEdit::write_file(&file, "y")], 0.65);

        let enforcing = applier(&dir, options(true, true));
        let result = enforcing.apply_patch(&patch, 1);
        assert!(result.success);
        assert_eq!(result.kind, ApplyKind::Suggestion);
        assert_eq!(fs::read_to_string(&file).unwrap(), "x");

        let lenient = applier(&dir, options(false, true));
        let result = lenient.apply_patch(&patch, 1);
        assert_eq!(result.kind, ApplyKind::Applied);
        assert_eq!(fs::read_to_string(&file).unwrap(), "y");
    }

    #[test]
    fn test_validation_rejects_without_backups() {
        let dir = TempDir::new().unwrap();
        let applier = applier(&dir, options(false, true));
        let patch = import_patch(vec![FileEdit::write_file(dir.path().join("nope.ts"), "y")], 0.9);

        let result = applier.apply_patch(&patch, 1);
        assert!(!result.success);
        assert!(result.backups.is_empty());
        assert!(!dir.path().join("nope.ts").exists());
    }

    #[test]
    fn test_batch_logged_as_one_line() {
        let dir = TempDir::new().unwrap();
        let applier = applier(&dir, options(true, true));
        let error = ErrorRecord::new("FAIL a.ts", None);
        let patches = vec![
            PatchCandidate::suggestion(&error, StrategyId::ReviewAssertion, 0.3, "a"),
            PatchCandidate::suggestion(&error, StrategyId::ReviewAssertion, 0.3, "b"),
        ];

        applier.apply_patches(&patches, 1).unwrap();
        applier.apply_patches(&patches[..1], 2).unwrap();

        let log = fs::read_to_string(applier.log_path()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["attempt"], 1);
        assert_eq!(first["results"].as_array().unwrap().len(), 2);
        assert_eq!(first["results"][0]["type"], "suggestion");
    }

    #[test]
    fn test_replace_semantics() {
        let literal = ReplaceSpec {
            from: ReplacePattern::Literal("a".into()),
            to: "b".into(),
            global: false,
        };
        assert_eq!(replace_text("a a", &literal).unwrap(), "b a");

        let regex = ReplaceSpec {
            from: ReplacePattern::Regex(r"(['])\./x(['])".into()),
            to: "${1}./X${2}".into(),
            global: true,
        };
        assert_eq!(
            replace_text("import a from './x'; import b from './x';", &regex).unwrap(),
            "import a from './X'; import b from './X';"
        );
    }

    #[test]
    fn test_insert_index_clamped() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "a").unwrap();
        apply_edit(&FileEdit::insert(&file, 99, "b")).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "a\nb");
    }
}
