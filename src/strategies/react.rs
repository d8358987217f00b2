//! React-family strategies

use crate::classifier::ErrorRecord;
use crate::errors::Result;
use crate::strategies::registry::StrategyContext;
use crate::strategies::text::{join_lines, split_lines};
use crate::strategies::types::{FileEdit, PatchCandidate, StrategyId};
use crate::strategies::typescript::optional_chain_line;
use regex::Regex;
use tracing::debug;

/// Identifiers never treated as effect dependencies
pub const HOOK_STOPWORDS: [&str; 14] = [
    "const",
    "let",
    "var",
    "function",
    "if",
    "else",
    "for",
    "while",
    "return",
    "console",
    "document",
    "window",
    "setTimeout",
    "setInterval",
];

/// Warning React emits for list children without a `key`
const KEY_WARNING: &str = r#"Each child in a list should have a unique ['"]?key['"]? prop"#;

/// Whether the record was classified from the missing-key warning, judged
/// only by what the classifier matched
fn is_key_warning(error: &ErrorRecord) -> Result<bool> {
    if error.first_match() == Some("key") {
        return Ok(true);
    }
    let warning = Regex::new(KEY_WARNING)?;
    Ok(error
        .trigger_line
        .as_deref()
        .map(|line| warning.is_match(line))
        .unwrap_or(false))
}

/// fixPropTypes, missing `key` case
pub fn fix_prop_types(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    if !is_key_warning(error)? {
        return Ok(None);
    }
    let Some((path, content)) = ctx.read_error_file(error)? else {
        return Ok(None);
    };

    let map_params = Regex::new(r"\.map\(\s*\(?\s*(\w+)\s*(?:,\s*(\w+))?\s*\)?\s*=>")?;
    let opening_tag = Regex::new(r"<([A-Za-z][\w.]*)")?;

    let mut lines = split_lines(&content);
    let mut rewritten = 0;
    for line in lines.iter_mut() {
        if !line.contains(".map(") || line.contains("key=") {
            continue;
        }
        let Some(params) = map_params.captures(line.as_str()) else {
            continue;
        };
        let key = params
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "index".to_string());
        if !opening_tag.is_match(line.as_str()) {
            continue;
        }
        let replaced = opening_tag
            .replace(line.as_str(), format!("<${{1}} key={{{}}}", key).as_str())
            .into_owned();
        *line = replaced;
        rewritten += 1;
    }

    if rewritten == 0 {
        return Ok(None);
    }

    Ok(Some(PatchCandidate::with_changes(
        error,
        StrategyId::FixPropTypes,
        0.8,
        vec![FileEdit::write_file(path, join_lines(&lines))],
        format!("Add key prop to {} mapped element(s)", rewritten),
    )))
}

/// Index of the line holding the brace that closes the block opened on
/// line `start`
fn closing_line(lines: &[String], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut opened = false;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
            if opened && depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Byte range of the effect body on a single-line `useEffect(...)`, from
/// just after its opening brace to its matching closing brace
fn inline_body(line: &str) -> Option<(usize, usize)> {
    let call = line.find("useEffect(")?;
    let open = call + line[call..].find('{')?;
    let mut depth = 0i32;
    for (idx, ch) in line[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open + 1, open + idx));
                }
            }
            _ => {}
        }
    }
    None
}

/// Bare identifiers in order of first appearance, minus stopwords, hooks,
/// and member names
pub fn effect_dependencies(body: &str) -> Result<Vec<String>> {
    let ident = Regex::new(r"[A-Za-z_$][\w$]*")?;
    let mut found: Vec<String> = Vec::new();

    for m in ident.find_iter(body) {
        let name = m.as_str();
        let after_dot = body[..m.start()].ends_with('.');
        if after_dot || name.starts_with("use") || HOOK_STOPWORDS.contains(&name) {
            continue;
        }
        if !found.iter().any(|f| f == name) {
            found.push(name.to_string());
        }
    }

    Ok(found)
}

/// fixHookDependencies
pub fn fix_hook_dependencies(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let Some((path, content)) = ctx.read_error_file(error)? else {
        return Ok(None);
    };

    let mut lines = split_lines(&content);
    let mut added: Vec<String> = Vec::new();
    let mut start = 0;

    while let Some(offset) = lines[start..].iter().position(|l| l.contains("useEffect(")) {
        let effect = start + offset;
        start = effect + 1;

        let Some(end) = closing_line(&lines, effect) else {
            break;
        };

        let array_line = if lines[end].contains("}, [])") {
            end
        } else if lines
            .get(end + 1)
            .map(|l| l.trim_start().starts_with("[]"))
            .unwrap_or(false)
        {
            end + 1
        } else {
            continue;
        };

        let (body, tail) = if end == effect {
            match inline_body(&lines[effect]) {
                Some((from, to)) => (lines[effect][from..to].to_string(), to),
                None => (String::new(), 0),
            }
        } else {
            (lines[effect + 1..end].join("\n"), 0)
        };
        let deps = effect_dependencies(&body)?;
        if deps.is_empty() {
            debug!(line = effect + 1, "useEffect body has no dependencies to add");
            continue;
        }

        let list = format!("[{}]", deps.join(", "));
        // Skip past the body so a `[]` inside it is left alone
        let split = if array_line == effect { tail } else { 0 };
        let line = &lines[array_line];
        let (head, rest) = line.split_at(split.min(line.len()));
        lines[array_line] = format!("{}{}", head, rest.replacen("[]", &list, 1));
        added.extend(deps);
        start = array_line + 1;
    }

    if added.is_empty() {
        return Ok(None);
    }

    Ok(Some(PatchCandidate::with_changes(
        error,
        StrategyId::FixHookDependencies,
        0.7,
        vec![FileEdit::write_file(path, join_lines(&lines))],
        format!("Add effect dependencies: {}", added.join(", ")),
    )))
}

/// addNullChecks
pub fn add_null_checks(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    let nullish_read = error.evidence().iter().any(|text| {
        text.contains("Cannot read propert") && (text.contains("undefined") || text.contains("null"))
    });
    if !nullish_read {
        return Ok(None);
    }
    let Some(line_number) = error.line_number else {
        return Ok(None);
    };
    let Some((path, content)) = ctx.read_error_file(error)? else {
        return Ok(None);
    };
    let Some(updated) = optional_chain_line(&content, line_number)? else {
        return Ok(None);
    };

    Ok(Some(PatchCandidate::with_changes(
        error,
        StrategyId::AddNullChecks,
        0.6,
        vec![FileEdit::write_file(path, updated)],
        format!("Guard property access on line {}", line_number),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorType;
    use std::fs;
    use tempfile::TempDir;

    fn react_error(file: &str, matches: Vec<String>, line: &str) -> ErrorRecord {
        let mut error = ErrorRecord::new(format!("FAIL {}", file), Some(file.to_string()));
        error.classify(ErrorType::React, matches, line);
        error
    }

    fn key_error(file: &str) -> ErrorRecord {
        react_error(
            file,
            vec!["key".into()],
            "Warning: Each child in a list should have a unique \"key\" prop.",
        )
    }

    #[test]
    fn test_key_injected_with_index_param() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("List.tsx"),
            "return guests.map((guest, i) => <li className=\"g\">{guest.name}</li>);\n",
        )
        .unwrap();
        let ctx = StrategyContext::new(dir.path());

        let patch = fix_prop_types(&key_error("List.tsx"), &ctx).unwrap().unwrap();
        assert_eq!(patch.confidence, 0.8);
        assert_eq!(
            patch.changes[0].content.as_deref(),
            Some("return guests.map((guest, i) => <li key={i} className=\"g\">{guest.name}</li>);\n")
        );
    }

    #[test]
    fn test_key_falls_back_to_index_token() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("List.tsx"), "items.map(item => <Item.Row value={item} />)").unwrap();
        let ctx = StrategyContext::new(dir.path());

        let patch = fix_prop_types(&key_error("List.tsx"), &ctx).unwrap().unwrap();
        assert_eq!(
            patch.changes[0].content.as_deref(),
            Some("items.map(item => <Item.Row key={index} value={item} />)")
        );
    }

    #[test]
    fn test_key_already_present_declines() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("List.tsx"), "items.map(item => <li key={item.id}>x</li>)").unwrap();
        let ctx = StrategyContext::new(dir.path());
        assert!(fix_prop_types(&key_error("List.tsx"), &ctx).unwrap().is_none());
    }

    #[test]
    fn test_prop_types_ignores_non_key_warnings() {
        let ctx = StrategyContext::new("/tmp");
        let error = react_error("a.tsx", vec!["x".into()], "Invalid hook call");
        assert!(fix_prop_types(&error, &ctx).unwrap().is_none());
    }

    #[test]
    fn test_prop_types_ignores_key_in_file_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("KeyList.tsx"), "return guests.map((g) => <li>{g}</li>);\n").unwrap();
        let ctx = StrategyContext::new(dir.path());
        let mut error = react_error(
            "KeyList.tsx",
            vec!["undefined".into(), "keys".into()],
            "TypeError: Cannot read properties of undefined (reading 'keys')",
        );
        error.stack_trace.push("    at KeyList (src/KeyList.tsx:1:8)".to_string());

        assert!(fix_prop_types(&error, &ctx).unwrap().is_none());
    }

    #[test]
    fn test_key_warning_recognised_from_trigger_line() {
        let error = react_error(
            "List.tsx",
            Vec::new(),
            "Warning: Each child in a list should have a unique 'key' prop.",
        );
        assert!(is_key_warning(&error).unwrap());
        assert!(is_key_warning(&key_error("List.tsx")).unwrap());
    }

    #[test]
    fn test_effect_dependencies_filtering() {
        let deps = effect_dependencies("  const data = fetchGuests(weddingId);\n  setGuests(data);\n  console.log(state.count);\n  useThing();").unwrap();
        assert_eq!(deps, vec!["data", "fetchGuests", "weddingId", "setGuests", "state"]);
    }

    #[test]
    fn test_hook_dependencies_inline_array() {
        let dir = TempDir::new().unwrap();
        let source = "useEffect(() => {\n  load(userId);\n}, []);\n";
        fs::write(dir.path().join("Page.tsx"), source).unwrap();
        let ctx = StrategyContext::new(dir.path());
        let error = react_error("Page.tsx", vec!["useEffect".into()], "React Hook useEffect has a missing dependency");

        let patch = fix_hook_dependencies(&error, &ctx).unwrap().unwrap();
        assert_eq!(patch.confidence, 0.7);
        assert_eq!(
            patch.changes[0].content.as_deref(),
            Some("useEffect(() => {\n  load(userId);\n}, [load, userId]);\n")
        );
    }

    #[test]
    fn test_hook_dependencies_array_on_next_line() {
        let dir = TempDir::new().unwrap();
        let source = "useEffect(() => {\n  if (open) { refresh(); }\n},\n[]);\n";
        fs::write(dir.path().join("Page.tsx"), source).unwrap();
        let ctx = StrategyContext::new(dir.path());
        let error = react_error("Page.tsx", vec![], "React Hook useEffect has missing dependencies");

        let patch = fix_hook_dependencies(&error, &ctx).unwrap().unwrap();
        assert_eq!(
            patch.changes[0].content.as_deref(),
            Some("useEffect(() => {\n  if (open) { refresh(); }\n},\n[open, refresh]);\n")
        );
    }

    #[test]
    fn test_hook_dependencies_single_line_effect() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Page.tsx"), "useEffect(() => { load(id); }, []);\n").unwrap();
        let ctx = StrategyContext::new(dir.path());
        let error = react_error("Page.tsx", vec![], "React Hook useEffect has a missing dependency");

        let patch = fix_hook_dependencies(&error, &ctx).unwrap().unwrap();
        assert_eq!(
            patch.changes[0].content.as_deref(),
            Some("useEffect(() => { load(id); }, [load, id]);\n")
        );
    }

    #[test]
    fn test_inline_body_range() {
        let line = "  useEffect(() => { if (a) { b(); } }, []);";
        let (from, to) = inline_body(line).unwrap();
        assert_eq!(&line[from..to], " if (a) { b(); } ");
        assert!(inline_body("useEffect(() => {").is_none());
    }

    #[test]
    fn test_hook_with_dependencies_declines() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Page.tsx"), "useEffect(() => {\n  load(id);\n}, [id]);\n").unwrap();
        let ctx = StrategyContext::new(dir.path());
        let error = react_error("Page.tsx", vec![], "React Hook useEffect has a missing dependency");
        assert!(fix_hook_dependencies(&error, &ctx).unwrap().is_none());
    }

    #[test]
    fn test_null_checks() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Card.tsx"), "const a = 1;\nconst t = wedding.title;\n").unwrap();
        let ctx = StrategyContext::new(dir.path());
        let mut error = react_error(
            "Card.tsx",
            vec!["undefined".into(), "title".into()],
            "TypeError: Cannot read properties of undefined (reading 'title')",
        );
        error.line_number = Some(2);

        let patch = add_null_checks(&error, &ctx).unwrap().unwrap();
        assert_eq!(patch.confidence, 0.6);
        assert_eq!(
            patch.changes[0].content.as_deref(),
            Some("const a = 1;\nconst t = wedding?.title;\n")
        );
    }
}
