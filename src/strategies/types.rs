//! Patch strategy type definitions

use crate::classifier::ErrorRecord;
use crate::errors::{PatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Every strategy the engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyId {
    FixMissingImports,
    FixRelativePaths,
    FixTypoInImports,
    AddMissingPackages,
    FixDefaultExports,
    FixNamedExports,
    AddTypeAssertions,
    FixMissingProperties,
    FixTableNames,
    FixColumnNames,
    FixPropTypes,
    FixHookDependencies,
    AddNullChecks,
    ReviewSyntaxError,
    ReviewTestSelectors,
    ReviewAssertion,
}

impl StrategyId {
    /// Stable name used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            StrategyId::FixMissingImports => "fixMissingImports",
            StrategyId::FixRelativePaths => "fixRelativePaths",
            StrategyId::FixTypoInImports => "fixTypoInImports",
            StrategyId::AddMissingPackages => "addMissingPackages",
            StrategyId::FixDefaultExports => "fixDefaultExports",
            StrategyId::FixNamedExports => "fixNamedExports",
            StrategyId::AddTypeAssertions => "addTypeAssertions",
            StrategyId::FixMissingProperties => "fixMissingProperties",
            StrategyId::FixTableNames => "fixTableNames",
            StrategyId::FixColumnNames => "fixColumnNames",
            StrategyId::FixPropTypes => "fixPropTypes",
            StrategyId::FixHookDependencies => "fixHookDependencies",
            StrategyId::AddNullChecks => "addNullChecks",
            StrategyId::ReviewSyntaxError => "reviewSyntaxError",
            StrategyId::ReviewTestSelectors => "reviewTestSelectors",
            StrategyId::ReviewAssertion => "reviewAssertion",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Search side of a pattern replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ReplacePattern {
    Literal(String),
    Regex(String),
}

/// Pattern replacement payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceSpec {
    pub from: ReplacePattern,
    pub to: String,
    /// Replace every occurrence instead of only the first
    #[serde(default)]
    pub global: bool,
}

/// One edit against a single file
///
/// Exactly one shape may be populated: whole-file `content`, positional
/// `insert_at` + `insert_content`, or `replace`. Shapes are kept as optional
/// fields so edits read from disk can be validated; use the constructors to
/// build well-formed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEdit {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_at: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<ReplaceSpec>,
}

/// Resolved edit shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOperation<'a> {
    WriteFile { content: &'a str },
    Insert { at: usize, content: &'a str },
    Replace(&'a ReplaceSpec),
}

impl FileEdit {
    fn empty(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            content: None,
            insert_at: None,
            insert_content: None,
            replace: None,
        }
    }

    /// Whole-file replacement
    pub fn write_file(file: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::empty(file)
        }
    }

    /// Insert text as a new line at `at` (0-based line index)
    pub fn insert(file: impl Into<PathBuf>, at: usize, content: impl Into<String>) -> Self {
        Self {
            insert_at: Some(at),
            insert_content: Some(content.into()),
            ..Self::empty(file)
        }
    }

    /// Pattern replacement
    pub fn replace(file: impl Into<PathBuf>, from: ReplacePattern, to: impl Into<String>, global: bool) -> Self {
        Self {
            replace: Some(ReplaceSpec {
                from,
                to: to.into(),
                global,
            }),
            ..Self::empty(file)
        }
    }

    /// Resolve the single populated shape
    pub fn operation(&self) -> Result<EditOperation<'_>> {
        let has_insert = self.insert_at.is_some() || self.insert_content.is_some();
        let shapes = [self.content.is_some(), has_insert, self.replace.is_some()]
            .iter()
            .filter(|s| **s)
            .count();

        if shapes == 0 {
            return Err(PatchError::Validation(format!(
                "edit for {} specifies no operation",
                self.file.display()
            )));
        }
        if shapes > 1 {
            return Err(PatchError::Validation(format!(
                "edit for {} specifies more than one operation",
                self.file.display()
            )));
        }

        if let Some(content) = &self.content {
            return Ok(EditOperation::WriteFile { content });
        }
        if let Some(spec) = &self.replace {
            return Ok(EditOperation::Replace(spec));
        }
        match (self.insert_at, &self.insert_content) {
            (Some(at), Some(content)) => Ok(EditOperation::Insert { at, content }),
            _ => Err(PatchError::Validation(format!(
                "insert edit for {} needs both insertAt and insertContent",
                self.file.display()
            ))),
        }
    }
}

/// One proposed remedy for one error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchCandidate {
    /// Error this patch addresses
    pub error: ErrorRecord,

    /// Strategy that produced it
    pub strategy: StrategyId,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// File edits; empty for suggestion-only patches
    pub changes: Vec<FileEdit>,

    pub description: Option<String>,

    pub suggestion: Option<String>,
}

impl PatchCandidate {
    /// Patch carrying concrete edits
    pub fn with_changes(
        error: &ErrorRecord,
        strategy: StrategyId,
        confidence: f64,
        changes: Vec<FileEdit>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            error: error.clone(),
            strategy,
            confidence: confidence.clamp(0.0, 1.0),
            changes,
            description: Some(description.into()),
            suggestion: None,
        }
    }

    /// Advice for a human, no edits
    pub fn suggestion(
        error: &ErrorRecord,
        strategy: StrategyId,
        confidence: f64,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            error: error.clone(),
            strategy,
            confidence: confidence.clamp(0.0, 1.0),
            changes: Vec::new(),
            description: None,
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn is_suggestion_only(&self) -> bool {
        self.changes.is_empty()
    }

    /// Human-readable rationale
    pub fn summary(&self) -> String {
        self.suggestion
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_else(|| format!("{} patch", self.strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names_serialize_camel_case() {
        let json = serde_json::to_string(&StrategyId::FixMissingImports).unwrap();
        assert_eq!(json, "\"fixMissingImports\"");
        assert_eq!(StrategyId::FixHookDependencies.name(), "fixHookDependencies");
    }

    #[test]
    fn test_edit_shapes() {
        let write = FileEdit::write_file("a.ts", "x");
        assert!(matches!(write.operation().unwrap(), EditOperation::WriteFile { .. }));

        let insert = FileEdit::insert("a.ts", 3, "import x from 'x';");
        assert_eq!(
            insert.operation().unwrap(),
            EditOperation::Insert { at: 3, content: "import x from 'x';" }
        );

        let replace = FileEdit::replace("a.ts", ReplacePattern::Literal("a".into()), "b", true);
        assert!(matches!(replace.operation().unwrap(), EditOperation::Replace(_)));
    }

    #[test]
    fn test_edit_rejects_missing_shape() {
        let edit = FileEdit::empty("a.ts");
        assert!(edit.operation().is_err());
    }

    #[test]
    fn test_edit_rejects_ambiguous_shape() {
        let mut edit = FileEdit::write_file("a.ts", "x");
        edit.insert_at = Some(0);
        edit.insert_content = Some("y".into());
        let err = edit.operation().unwrap_err();
        assert!(err.to_string().contains("more than one"));
    }

    #[test]
    fn test_edit_rejects_half_insert() {
        let mut edit = FileEdit::empty("a.ts");
        edit.insert_content = Some("y".into());
        assert!(edit.operation().is_err());
    }

    #[test]
    fn test_confidence_clamped() {
        let error = ErrorRecord::new("FAIL x", None);
        let patch = PatchCandidate::suggestion(&error, StrategyId::ReviewAssertion, 1.7, "look");
        assert_eq!(patch.confidence, 1.0);
        assert!(patch.is_suggestion_only());
        assert_eq!(patch.summary(), "look");
    }
}
