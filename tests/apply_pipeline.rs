//! Integration tests for classify → generate → apply against a real tree

use autopatch::{
    applier::backup::BACKUP_EXTENSION,
    applier::{backup_file_name, ApplierOptions, ApplyKind, PatchApplier},
    classifier::{ErrorClassifier, ErrorRecord, ErrorType},
    strategies::{
        FileEdit, PatchCandidate, PatchStrategyEngine, ReplacePattern, StrategyContext, StrategyId,
        StrategyRegistry,
    },
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn applier(dir: &Path) -> PatchApplier {
    PatchApplier::new(
        dir.join(".autopatch/backups"),
        dir.join(".autopatch/logs/patches.jsonl"),
        ApplierOptions::default(),
    )
    .unwrap()
}

fn write(dir: &Path, rel: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_relative_import_case_is_repaired_end_to_end() {
    let dir = TempDir::new().unwrap();
    let app = write(
        dir.path(),
        "src/App.tsx",
        "import Button from './button';\n\nexport default function App() {\n  return <Button />;\n}\n",
    );
    write(dir.path(), "src/Button.tsx", "export default function Button() {\n  return null;\n}\n");

    let output = "FAIL src/App.test.tsx\nError: Cannot find module './button' from 'src/App.tsx'\n";
    let errors = ErrorClassifier::new().unwrap().analyze(output);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::Import);

    let patches = PatchStrategyEngine::builtin(dir.path()).generate_patches(&errors);
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].strategy, StrategyId::FixMissingImports);

    let batch = applier(dir.path()).apply_patches(&patches, 1).unwrap();
    assert_eq!(batch.success_count, 1);
    assert_eq!(batch.results[0].kind, ApplyKind::Applied);
    assert_eq!(batch.results[0].backups.len(), 1);

    let patched = fs::read_to_string(&app).unwrap();
    assert!(patched.starts_with("import Button from './Button';"));
}

#[test]
fn test_failed_edit_restores_every_touched_file() {
    let dir = TempDir::new().unwrap();
    let first = write(dir.path(), "src/a.ts", "export const a = 1;\n");
    let second = write(dir.path(), "src/b.ts", "export const b = 2;\n");

    let error = ErrorRecord::new("FAIL src/a.ts", Some("src/a.ts".to_string()));
    let patch = PatchCandidate::with_changes(
        &error,
        StrategyId::FixDefaultExports,
        0.99,
        vec![
            FileEdit::write_file(&first, "export const a = 100;\n"),
            // Unbalanced group: compiling the pattern fails mid-patch
            FileEdit::replace(&second, ReplacePattern::Regex("(".to_string()), "x", false),
        ],
        "two-file patch",
    );

    let applier = applier(dir.path());
    let batch = applier.apply_patches(&[patch], 1).unwrap();

    assert_eq!(batch.failure_count, 1);
    let result = &batch.results[0];
    assert!(!result.success);
    assert_eq!(result.backups.len(), 2);
    assert!(result.error.is_some());
    assert_eq!(fs::read_to_string(&first).unwrap(), "export const a = 1;\n");
    assert_eq!(fs::read_to_string(&second).unwrap(), "export const b = 2;\n");
}

#[test]
fn test_backups_follow_naming_scheme_and_log_grows_per_batch() {
    let dir = TempDir::new().unwrap();
    let target = write(dir.path(), "src/Card.tsx", "export function Card() {}\n");
    let error = ErrorRecord::new("FAIL src/Card.tsx", Some("src/Card.tsx".to_string()));
    let patch = PatchCandidate::with_changes(
        &error,
        StrategyId::FixDefaultExports,
        0.99,
        vec![FileEdit::insert(&target, 99, "export default Card;")],
        "Add default export for Card",
    );

    let applier = applier(dir.path());
    let first = applier.apply_patches(std::slice::from_ref(&patch), 1).unwrap();
    applier.apply_patches(&[patch], 2).unwrap();

    let backup = &first.results[0].backups[0];
    let name = backup.backup_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("Card.tsx."));
    assert!(name.ends_with(&format!(".attempt-1.{}", BACKUP_EXTENSION)));
    assert!(!name.contains(':'));
    assert_eq!(name, backup_file_name(&target, backup.timestamp, 1));

    let log = fs::read_to_string(applier.log_path()).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert_eq!(applier.backup_store().list().unwrap().len(), 2);
}

struct EditCase {
    strategy: StrategyId,
    error_type: ErrorType,
    file: &'static str,
    source: &'static str,
    matches: &'static [&'static str],
    trigger: &'static str,
    line: Option<u32>,
    expected: &'static str,
}

const EDIT_CASES: [EditCase; 8] = [
    EditCase {
        strategy: StrategyId::FixMissingImports,
        error_type: ErrorType::Import,
        file: "src/App.test.tsx",
        source: "import App from './App';\n\ntest('x', () => {});\n",
        matches: &["vitest"],
        trigger: "Error: Cannot find module 'vitest'",
        line: None,
        expected: "import { describe, it, expect, vi } from 'vitest';",
    },
    EditCase {
        strategy: StrategyId::FixRelativePaths,
        error_type: ErrorType::Import,
        file: "src/Main.tsx",
        source: "import Main from './main';\n",
        matches: &["./main"],
        trigger: "Error: Cannot find module './main'",
        line: None,
        expected: "from './Main';",
    },
    EditCase {
        strategy: StrategyId::FixTypoInImports,
        error_type: ErrorType::Import,
        file: "src/Page.tsx",
        source: "import React from 'raect';\n",
        matches: &["raect"],
        trigger: "Error: Cannot find module 'raect'",
        line: None,
        expected: "from 'react';",
    },
    EditCase {
        strategy: StrategyId::FixDefaultExports,
        error_type: ErrorType::Export,
        file: "src/Card.tsx",
        source: "export function Card() {\n  return null;\n}\n",
        matches: &["default"],
        trigger: "does not provide an export named 'default'",
        line: None,
        expected: "export default Card;",
    },
    EditCase {
        strategy: StrategyId::AddTypeAssertions,
        error_type: ErrorType::Typescript,
        file: "src/guest.ts",
        source: "const n = guest.name;\n",
        matches: &["guest"],
        trigger: "error TS18048: 'guest' is possibly 'undefined'.",
        line: Some(1),
        expected: "guest?.name",
    },
    EditCase {
        strategy: StrategyId::FixPropTypes,
        error_type: ErrorType::React,
        file: "src/List.tsx",
        source: "return guests.map((g, i) => <li>{g}</li>);\n",
        matches: &["key"],
        trigger: "Warning: Each child in a list should have a unique \"key\" prop.",
        line: None,
        expected: "<li key={i}>",
    },
    EditCase {
        strategy: StrategyId::FixHookDependencies,
        error_type: ErrorType::React,
        file: "src/Effect.tsx",
        source: "useEffect(() => {\n  load(id);\n}, []);\n",
        matches: &["useEffect"],
        trigger: "React Hook useEffect has a missing dependency",
        line: None,
        expected: "[load, id]",
    },
    EditCase {
        strategy: StrategyId::AddNullChecks,
        error_type: ErrorType::React,
        file: "src/Venue.tsx",
        source: "const t = venue.title;\n",
        matches: &["undefined", "title"],
        trigger: "TypeError: Cannot read properties of undefined (reading 'title')",
        line: Some(1),
        expected: "venue?.title",
    },
];

#[test]
fn test_every_editing_strategy_clears_default_gates() {
    let dir = TempDir::new().unwrap();
    let ctx = StrategyContext::new(dir.path());
    let registry = StrategyRegistry::builtin();
    let applier = applier(dir.path());

    for case in &EDIT_CASES {
        let path = write(dir.path(), case.file, case.source);
        let mut error = ErrorRecord::new(format!("FAIL {}", case.file), Some(case.file.to_string()));
        error.classify(
            case.error_type,
            case.matches.iter().map(|m| m.to_string()).collect(),
            case.trigger,
        );
        error.line_number = case.line;

        let strategy = registry.get(case.strategy).unwrap();
        let patch = strategy(&error, &ctx)
            .unwrap()
            .unwrap_or_else(|| panic!("{} declined", case.strategy));
        assert!(!patch.is_suggestion_only(), "{}", case.strategy);

        let result = applier.apply_patch(&patch, 1);
        assert_eq!(result.kind, ApplyKind::Applied, "{}: {:?}", case.strategy, result.message);
        let patched = fs::read_to_string(&path).unwrap();
        assert!(patched.contains(case.expected), "{}: {}", case.strategy, patched);
    }
}
