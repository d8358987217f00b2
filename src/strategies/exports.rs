//! Export-family strategies

use crate::classifier::ErrorRecord;
use crate::errors::Result;
use crate::strategies::registry::StrategyContext;
use crate::strategies::text::similarity;
use crate::strategies::types::{FileEdit, PatchCandidate, StrategyId};
use regex::Regex;

/// Names closer than this are offered as the intended export
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.8;

/// fixDefaultExports
pub fn fix_default_exports(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some((path, content)) = ctx.read_error_file(error)? else {
        return Ok(None);
    };
    if content.contains("export default") {
        return Ok(None);
    }

    let declaration = Regex::new(r"(?m)^(?:export\s+)?(?:function|const|class)\s+([A-Z]\w*)")?;
    let Some(name) = declaration
        .captures(&content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return Ok(None);
    };

    let updated = format!("{}\n\nexport default {};\n", content.trim_end(), name);

    Ok(Some(PatchCandidate::with_changes(
        error,
        StrategyId::FixDefaultExports,
        0.8,
        vec![FileEdit::write_file(path, updated)],
        format!("Add default export for {}", name),
    )))
}

/// fixNamedExports
///
/// Only ever advises; renaming an export touches every importer.
pub fn fix_named_exports(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some(expected) = error.first_match().map(str::to_string) else {
        return Ok(None);
    };
    let Some((_, content)) = ctx.read_error_file(error)? else {
        return Ok(None);
    };

    let declaration = Regex::new(r"export\s+(?:const|function|class)\s+(\w+)")?;
    let best = declaration
        .captures_iter(&content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|name| *name != expected)
        .map(|name| (name, similarity(name, &expected)))
        .filter(|(_, score)| *score > NAME_SIMILARITY_THRESHOLD)
        .fold(None::<(&str, f64)>, |best, candidate| match best {
            Some((_, score)) if score >= candidate.1 => best,
            _ => Some(candidate),
        });

    Ok(best.map(|(name, _)| {
        PatchCandidate::suggestion(
            error,
            StrategyId::FixNamedExports,
            0.6,
            format!("Did you mean to import '{}' instead of '{}'?", name, expected),
        )
    }))
}
