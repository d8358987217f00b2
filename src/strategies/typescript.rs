//! TypeScript-family strategies

use crate::classifier::ErrorRecord;
use crate::errors::Result;
use crate::strategies::registry::StrategyContext;
use crate::strategies::text::{join_lines, split_lines};
use crate::strategies::types::{FileEdit, PatchCandidate, StrategyId};
use regex::Regex;

/// Rewrite member access on one 1-based line to optional chaining
///
/// Tries `a.b` -> `a?.b` first, then `a[` -> `a?.[`, and stops after the
/// first shape that matches. `None` when the line is out of range or
/// nothing changed.
pub fn optional_chain_line(content: &str, line_number: u32) -> Result<Option<String>> {
    let mut lines = split_lines(content);
    let Some(idx) = (line_number as usize).checked_sub(1) else {
        return Ok(None);
    };
    let Some(line) = lines.get(idx) else {
        return Ok(None);
    };

    let rewrites = [(r"(\w+)\.(\w+)", "${1}?.${2}"), (r"(\w+)\[", "${1}?.[")];
    for (pattern, replacement) in rewrites {
        let re = Regex::new(pattern)?;
        if re.is_match(line) {
            let rewritten = re.replace(line, replacement).into_owned();
            if rewritten == *line {
                return Ok(None);
            }
            lines[idx] = rewritten;
            return Ok(Some(join_lines(&lines)));
        }
    }

    Ok(None)
}

fn mentions_possibly_nullish(error: &ErrorRecord) -> bool {
    error.evidence().iter().any(|text| {
        let text = text.to_lowercase();
        text.contains("possibly") && (text.contains("null") || text.contains("undefined"))
    })
}

/// addTypeAssertions
pub fn add_type_assertions(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some(line_number) = error.line_number else {
        return Ok(None);
    };
    if !mentions_possibly_nullish(error) {
        return Ok(None);
    }
    let Some((path, content)) = ctx.read_error_file(error)? else {
        return Ok(None);
    };
    let Some(updated) = optional_chain_line(&content, line_number)? else {
        return Ok(None);
    };

    Ok(Some(PatchCandidate::with_changes(
        error,
        StrategyId::AddTypeAssertions,
        0.7,
        vec![FileEdit::write_file(path, updated)],
        format!("Use optional chaining on line {}", line_number),
    )))
}

/// fixMissingProperties
pub fn fix_missing_properties(error: &ErrorRecord, _ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some(property) = error.first_match() else {
        return Ok(None);
    };
    let Some(trigger) = error.trigger_line.as_deref() else {
        return Ok(None);
    };
    if !trigger.contains("Property") {
        return Ok(None);
    }

    Ok(Some(PatchCandidate::suggestion(
        error,
        StrategyId::FixMissingProperties,
        0.5,
        format!(
            "Add property '{}' to the object or declare it optional in its type",
            property
        ),
    )))
}
