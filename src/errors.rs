//! Error types for autopatch
//!
//! One crate-wide error enum. Strategy and apply faults are recovered
//! locally by their callers; everything that reaches `main` is fatal.

use thiserror::Error;

/// Main error type for the auto-patch pipeline
#[derive(Error, Debug)]
pub enum PatchError {
    /// Configuration errors (startup validation, unreadable config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Patch or edit failed validation
    #[error("Patch validation failed: {0}")]
    Validation(String),

    /// A strategy could not produce a result
    #[error("Strategy {strategy} failed: {reason}")]
    Strategy { strategy: String, reason: String },

    /// Test runner could not be driven (unknown suite, bad command)
    #[error("Test runner error: {0}")]
    TestRunner(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Orchestration state machine errors
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Run was cancelled between phases
    #[error("Run cancelled")]
    Cancelled,

    /// Regex compilation errors
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for autopatch operations
pub type Result<T> = std::result::Result<T, PatchError>;

/// Convert anyhow errors to PatchError
impl From<anyhow::Error> for PatchError {
    fn from(err: anyhow::Error) -> Self {
        PatchError::Generic(err.to_string())
    }
}

impl PatchError {
    /// Build a strategy fault
    pub fn strategy(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        PatchError::Strategy {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PatchError::Timeout { duration_ms: 120000 };
        assert!(err.to_string().contains("120000"));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = PatchError::InvalidTransition {
            from: "Idle".to_string(),
            to: "CycleLoop".to_string(),
            reason: "tests have not run".to_string(),
        };
        assert!(err.to_string().contains("Idle"));
        assert!(err.to_string().contains("CycleLoop"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.ts");
        let err: PatchError = io.into();
        assert!(matches!(err, PatchError::Io(_)));
        assert!(err.to_string().contains("missing.ts"));
    }

    #[test]
    fn test_strategy_error() {
        let err = PatchError::strategy("fixTableNames", "no table captured");
        assert_eq!(
            err.to_string(),
            "Strategy fixTableNames failed: no table captured"
        );
    }
}
