//! Import-family strategies
//!
//! - fixMissingImports: insert a canonical import for known modules, or
//!   hand relative specifiers to path resolution
//! - fixRelativePaths: resolve a relative specifier against the importer
//! - fixTypoInImports: correct known misspelled specifiers
//! - addMissingPackages: advise installing a bare package

use crate::classifier::ErrorRecord;
use crate::errors::Result;
use crate::strategies::registry::StrategyContext;
use crate::strategies::text::split_lines;
use crate::strategies::types::{FileEdit, PatchCandidate, ReplacePattern, StrategyId};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Extensions tried, in order, when resolving a relative specifier
pub const RESOLVE_EXTENSIONS: [&str; 5] = ["ts", "tsx", "js", "jsx", "json"];

const MODULE_SHAPES: [&str; 3] = [
    r#"Cannot find module ['"]([^'"]+)['"]"#,
    r#"Can't resolve ['"]([^'"]+)['"]"#,
    r#"Failed to resolve import ['"]([^'"]+)['"]"#,
];

/// Specifier that could not be resolved
pub fn missing_module(error: &ErrorRecord) -> Result<Option<String>> {
    if let Some(first) = error.first_match() {
        return Ok(Some(first.to_string()));
    }
    for shape in MODULE_SHAPES {
        let re = Regex::new(shape)?;
        for text in error.evidence() {
            if let Some(caps) = re.captures(text) {
                return Ok(caps.get(1).map(|m| m.as_str().to_string()));
            }
        }
    }
    Ok(None)
}

/// File doing the importing: named in the message when present, else the
/// error's own file
fn importer_file(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PathBuf>> {
    let re = Regex::new(r#"(?:from|in) ['"]([^'"]+\.[cm]?[jt]sx?)['"]"#)?;
    for text in error.evidence() {
        if let Some(path) = re.captures(text).and_then(|c| c.get(1)) {
            return Ok(Some(ctx.resolve(path.as_str())));
        }
    }
    Ok(error.file.as_deref().map(|f| ctx.resolve(f)))
}

fn is_relative(module: &str) -> bool {
    module.starts_with("./") || module.starts_with("../")
}

/// fixMissingImports
pub fn fix_missing_imports(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some(module) = missing_module(error)? else {
        return Ok(None);
    };

    if let Some(statement) = ctx.known_import(&module) {
        let Some((path, content)) = ctx.read_error_file(error)? else {
            return Ok(None);
        };
        if content.contains(statement) {
            return Ok(None);
        }

        let insert_at = after_last_import(&split_lines(&content))?;

        return Ok(Some(PatchCandidate::with_changes(
            error,
            StrategyId::FixMissingImports,
            0.9,
            vec![FileEdit::insert(path, insert_at, statement)],
            format!("Add missing import for '{}'", module),
        )));
    }

    if is_relative(&module) {
        return relative_path_patch(error, ctx, &module, StrategyId::FixMissingImports);
    }

    Ok(None)
}

/// Line index just past the last top-level import, following a
/// multi-line import down to the line that closes it
fn after_last_import(lines: &[String]) -> Result<usize> {
    let closes = Regex::new(r#"\bfrom\s*['"]|^import\s*['"]|;\s*$"#)?;
    let mut insert_at = 0;
    let mut open = false;
    for (idx, line) in lines.iter().enumerate() {
        if line.starts_with("import ") || line.starts_with("import{") {
            open = true;
        }
        if open && closes.is_match(line) {
            insert_at = idx + 1;
            open = false;
        }
    }
    Ok(insert_at)
}

/// fixRelativePaths
pub fn fix_relative_paths(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    match missing_module(error)? {
        Some(module) if is_relative(&module) => {
            relative_path_patch(error, ctx, &module, StrategyId::FixRelativePaths)
        }
        _ => Ok(None),
    }
}

fn relative_path_patch(
    error: &ErrorRecord,
    ctx: &StrategyContext,
    module: &str,
    strategy: StrategyId,
) -> Result<Option<PatchCandidate>> {
    let Some(importer) = importer_file(error, ctx)? else {
        return Ok(None);
    };
    let Some(base_dir) = importer.parent() else {
        return Ok(None);
    };
    let Some(corrected) = resolve_relative(base_dir, module) else {
        return Ok(None);
    };
    if corrected == module {
        return Ok(None);
    }

    let from = format!(r#"(['"]){}(['"])"#, regex::escape(module));
    let to = format!("${{1}}{}${{2}}", corrected.replace('$', "$$"));

    Ok(Some(PatchCandidate::with_changes(
        error,
        strategy,
        0.8,
        vec![FileEdit::replace(importer, ReplacePattern::Regex(from), to, true)],
        format!("Rewrite import '{}' to '{}'", module, corrected),
    )))
}

/// Resolve `module` relative to `base_dir`, returning the corrected
/// specifier with the extension stripped
pub fn resolve_relative(base_dir: &Path, module: &str) -> Option<String> {
    let stem = strip_known_extension(module);
    let (dir_part, name_part) = match stem.rfind('/') {
        Some(idx) => (&stem[..=idx], &stem[idx + 1..]),
        None => ("", stem),
    };
    let target_dir = base_dir.join(dir_part);

    for ext in RESOLVE_EXTENSIONS {
        let file_name = format!("{}.{}", name_part, ext);
        if let Some(found) = find_entry(&target_dir, &file_name) {
            let found_stem = found.trim_end_matches(&format!(".{}", ext)).to_string();
            return Some(format!("{}{}", dir_part, found_stem));
        }
    }

    let as_dir = base_dir.join(stem);
    for ext in RESOLVE_EXTENSIONS {
        if as_dir.join(format!("index.{}", ext)).is_file() {
            return Some(format!("{}/index", stem.trim_end_matches('/')));
        }
    }

    None
}

fn strip_known_extension(module: &str) -> &str {
    for ext in [".tsx", ".ts", ".jsx", ".js", ".json", ".mjs", ".cjs"] {
        if let Some(stripped) = module.strip_suffix(ext) {
            return stripped;
        }
    }
    module
}

/// Exact name if it exists, else a case-insensitive match from a listing
fn find_entry(dir: &Path, file_name: &str) -> Option<String> {
    if dir.join(file_name).is_file() {
        return Some(file_name.to_string());
    }
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .find(|name| name.eq_ignore_ascii_case(file_name))
}

/// fixTypoInImports
pub fn fix_typo_in_imports(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some((path, content)) = ctx.read_error_file(error)? else {
        return Ok(None);
    };

    let mut updated = content.clone();
    let mut fixed = Vec::new();
    for (typo, correct) in &ctx.import_typos {
        let re = Regex::new(&format!(r#"(['"]){}(['"/])"#, regex::escape(typo)))?;
        if re.is_match(&updated) {
            updated = re
                .replace_all(&updated, format!("${{1}}{}${{2}}", correct).as_str())
                .into_owned();
            fixed.push(format!("{} -> {}", typo, correct));
        }
    }

    if updated == content {
        return Ok(None);
    }

    Ok(Some(PatchCandidate::with_changes(
        error,
        StrategyId::FixTypoInImports,
        0.7,
        vec![FileEdit::write_file(path, updated)],
        format!("Correct import typos: {}", fixed.join(", ")),
    )))
}

/// Package portion of a bare specifier (`@scope/pkg/sub` -> `@scope/pkg`)
pub fn package_name(module: &str) -> Option<String> {
    if is_relative(module) || module.starts_with('/') || module.starts_with("node:") {
        return None;
    }
    let mut parts = module.split('/');
    let first = parts.next().filter(|p| !p.is_empty())?;
    if first.starts_with('@') {
        let second = parts.next().filter(|p| !p.is_empty())?;
        Some(format!("{}/{}", first, second))
    } else {
        Some(first.to_string())
    }
}

/// addMissingPackages
pub fn add_missing_packages(error: &ErrorRecord, _ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some(package) = missing_module(error)?.and_then(|m| package_name(&m)) else {
        return Ok(None);
    };

    Ok(Some(PatchCandidate::suggestion(
        error,
        StrategyId::AddMissingPackages,
        0.5,
        format!("Install the missing package: npm install {}", package),
    )))
}
