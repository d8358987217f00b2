//! Error classification
//! Turns raw test-runner output into typed, deduplicated error records

pub mod analyzer;
pub mod patterns;
pub mod types;

pub use analyzer::ErrorClassifier;
pub use patterns::PatternTable;
pub use types::{ErrorCategory, ErrorRecord, ErrorSummary, ErrorType, Severity};
