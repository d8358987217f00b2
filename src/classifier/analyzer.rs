//! Line-oriented scanner turning raw test output into error records
//!
//! A record opens at every failure marker and closes at the next one (or at
//! end of input). Any later line inside a block may re-classify the record:
//! the last successful match before the next marker wins. Stack frames fill
//! in the file when the marker line did not name one and always refresh the
//! line/column.

use crate::classifier::patterns::PatternTable;
use crate::classifier::types::{ErrorRecord, ErrorSummary};
use crate::errors::Result;
use std::collections::HashSet;

/// Converts test-runner output into deduplicated error records
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    table: PatternTable,
}

/// In-progress block state
struct OpenRecord {
    record: ErrorRecord,
    in_stack_trace: bool,
}

impl ErrorClassifier {
    /// Create classifier with the built-in pattern tables
    pub fn new() -> Result<Self> {
        Ok(Self::with_table(PatternTable::builtin()?))
    }

    /// Create classifier with explicit tables
    pub fn with_table(table: PatternTable) -> Self {
        Self { table }
    }

    /// Pattern tables in use
    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    /// Scan raw output and return records in first-seen order
    pub fn analyze(&self, raw_output: &str) -> Vec<ErrorRecord> {
        let mut records = Vec::new();
        let mut current: Option<OpenRecord> = None;

        for line in raw_output.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if self.table.is_failure_marker(line) {
                if let Some(open) = current.take() {
                    records.push(open.record);
                }
                let file = self.table.extract_file(line);
                current = Some(OpenRecord {
                    record: ErrorRecord::new(line, file),
                    in_stack_trace: false,
                });
            }

            let Some(open) = current.as_mut() else {
                continue;
            };

            if let Some(found) = self.table.classify(line) {
                open.record.classify(found.error_type, found.captures, line);
            }

            if let Some(frame) = self.table.extract_frame(line) {
                if open.record.file.is_none() {
                    open.record.file = Some(frame.file);
                }
                open.record.line_number = Some(frame.line);
                open.record.column = Some(frame.column);
                open.in_stack_trace = true;
            }

            if open.in_stack_trace {
                open.record.stack_trace.push(line.to_string());
            }
        }

        if let Some(open) = current.take() {
            records.push(open.record);
        }

        let records = dedupe(records);
        tracing::debug!(count = records.len(), "classified test output");
        records
    }

    /// Tally records by category, severity and type
    pub fn generate_summary(&self, errors: &[ErrorRecord]) -> ErrorSummary {
        summarize(errors)
    }
}

/// Drop later records sharing `(file, type, message)` with an earlier one
pub fn dedupe(records: Vec<ErrorRecord>) -> Vec<ErrorRecord> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        let key = (
            record.file.clone(),
            record.error_type,
            record.message.clone(),
        );
        if seen.insert(key) {
            unique.push(record);
        }
    }
    unique
}

/// Plain tally; `files` keeps first-seen order
pub fn summarize(errors: &[ErrorRecord]) -> ErrorSummary {
    let mut summary = ErrorSummary {
        total: errors.len(),
        ..Default::default()
    };

    for error in errors {
        *summary.by_category.entry(error.category).or_insert(0) += 1;
        *summary.by_severity.entry(error.severity).or_insert(0) += 1;
        *summary.by_type.entry(error.error_type).or_insert(0) += 1;
        if let Some(file) = &error.file {
            if !summary.files.contains(file) {
                summary.files.push(file.clone());
            }
        }
    }

    summary
}
