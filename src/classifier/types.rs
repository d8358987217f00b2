//! Classifier type definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Error family, decided by the first pattern family that matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Import,
    Export,
    Typescript,
    Database,
    React,
    Syntax,
    Testing,
    Unknown,
}

impl ErrorType {
    /// All classified types in pattern-table order (excludes `Unknown`)
    pub fn classified() -> [ErrorType; 7] {
        [
            ErrorType::Import,
            ErrorType::Export,
            ErrorType::Typescript,
            ErrorType::Database,
            ErrorType::React,
            ErrorType::Syntax,
            ErrorType::Testing,
        ]
    }

    /// Fixed severity for this type
    pub fn severity(&self) -> Severity {
        match self {
            ErrorType::Database => Severity::Critical,
            ErrorType::Import | ErrorType::Export | ErrorType::Syntax => Severity::High,
            ErrorType::Typescript | ErrorType::React => Severity::Medium,
            ErrorType::Testing | ErrorType::Unknown => Severity::Low,
        }
    }

    /// Fixed reporting category for this type
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorType::Import | ErrorType::Export => ErrorCategory::Dependency,
            ErrorType::Typescript => ErrorCategory::Types,
            ErrorType::Database => ErrorCategory::Database,
            ErrorType::React => ErrorCategory::React,
            ErrorType::Syntax => ErrorCategory::Syntax,
            ErrorType::Testing => ErrorCategory::Assertion,
            ErrorType::Unknown => ErrorCategory::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Import => "import",
            ErrorType::Export => "export",
            ErrorType::Typescript => "typescript",
            ErrorType::Database => "database",
            ErrorType::React => "react",
            ErrorType::Syntax => "syntax",
            ErrorType::Testing => "testing",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping used for report aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Dependency,
    Types,
    Database,
    React,
    Syntax,
    Assertion,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Dependency => "dependency",
            ErrorCategory::Types => "types",
            ErrorCategory::Database => "database",
            ErrorCategory::React => "react",
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Assertion => "assertion",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Tie-break weight used by patch prioritisation (higher = more urgent)
    pub fn weight(&self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::High => 2,
            Severity::Medium => 1,
            Severity::Low => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected failure in test-runner output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Implicated source or test file, if one could be resolved
    pub file: Option<String>,

    /// Error family
    #[serde(rename = "type")]
    pub error_type: ErrorType,

    /// Reporting category (fixed per type)
    pub category: ErrorCategory,

    /// Severity (fixed per type)
    pub severity: Severity,

    /// The failure-marker line that opened this record, raw
    pub message: String,

    /// Capture groups of the pattern that classified this record
    pub matches: Option<Vec<String>>,

    /// Lines following the first stack frame, up to the next marker
    pub stack_trace: Vec<String>,

    /// Line from the most recent matching stack frame
    pub line_number: Option<u32>,

    /// Column from the most recent matching stack frame
    pub column: Option<u32>,

    /// Line that produced the last successful classification
    pub trigger_line: Option<String>,
}

impl ErrorRecord {
    /// Start a new, unclassified record at a failure marker
    pub fn new(message: impl Into<String>, file: Option<String>) -> Self {
        let error_type = ErrorType::Unknown;
        Self {
            file,
            error_type,
            category: error_type.category(),
            severity: error_type.severity(),
            message: message.into(),
            matches: None,
            stack_trace: Vec::new(),
            line_number: None,
            column: None,
            trigger_line: None,
        }
    }

    /// Overwrite classification; type decides category and severity
    pub fn classify(&mut self, error_type: ErrorType, matches: Vec<String>, line: &str) {
        self.error_type = error_type;
        self.category = error_type.category();
        self.severity = error_type.severity();
        self.matches = Some(matches);
        self.trigger_line = Some(line.to_string());
    }

    /// First capture group, if any
    pub fn first_match(&self) -> Option<&str> {
        self.matches
            .as_ref()
            .and_then(|m| m.first())
            .map(|s| s.as_str())
    }

    /// Text strategies should search, most specific first
    pub fn evidence(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        if let Some(trigger) = &self.trigger_line {
            texts.push(trigger.as_str());
        }
        texts.push(self.message.as_str());
        texts.extend(self.stack_trace.iter().map(|s| s.as_str()));
        texts
    }

    /// Dedup key
    pub fn identity(&self) -> (Option<&str>, ErrorType, &str) {
        (self.file.as_deref(), self.error_type, self.message.as_str())
    }
}

/// Plain tally over a set of error records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_type: BTreeMap<ErrorType, usize>,
    /// Distinct resolved files, first-seen order
    pub files: Vec<String>,
}
