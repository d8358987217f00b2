//! Review-only strategies for syntax and test failures
//!
//! These never edit; they point a human at the failure.

use crate::classifier::ErrorRecord;
use crate::errors::Result;
use crate::strategies::registry::StrategyContext;
use crate::strategies::types::{PatchCandidate, StrategyId};

fn location(error: &ErrorRecord) -> String {
    let file = error.file.as_deref().unwrap_or("<unknown file>");
    match (error.line_number, error.column) {
        (Some(line), Some(col)) => format!("{}:{}:{}", file, line, col),
        (Some(line), None) => format!("{}:{}", file, line),
        _ => file.to_string(),
    }
}

fn detail(error: &ErrorRecord) -> &str {
    error
        .trigger_line
        .as_deref()
        .unwrap_or(error.message.as_str())
        .trim()
}

/// reviewSyntaxError
pub fn review_syntax_error(error: &ErrorRecord, _ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    Ok(Some(PatchCandidate::suggestion(
        error,
        StrategyId::ReviewSyntaxError,
        0.3,
        format!("Review syntax at {}: {}", location(error), detail(error)),
    )))
}

/// reviewTestSelectors
pub fn review_test_selectors(error: &ErrorRecord, _ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let missing_element = error.evidence().iter().any(|text| {
        text.contains("Unable to find") || text.contains("TestingLibraryElementError")
    });
    if !missing_element {
        return Ok(None);
    }

    Ok(Some(PatchCandidate::suggestion(
        error,
        StrategyId::ReviewTestSelectors,
        0.4,
        format!(
            "Element query failed in {}; check the selector or await the element: {}",
            location(error),
            detail(error)
        ),
    )))
}

/// reviewAssertion
pub fn review_assertion(error: &ErrorRecord, _ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    Ok(Some(PatchCandidate::suggestion(
        error,
        StrategyId::ReviewAssertion,
        0.3,
        format!(
            "Assertion failed in {}; confirm whether the code or the expectation is wrong: {}",
            location(error),
            detail(error)
        ),
    )))
}
