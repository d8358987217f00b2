//! Strategy tables
//!
//! Two read-only tables drive the engine: the plan (error type to ordered
//! strategy ids) and the registry (strategy id to function). Both are built
//! once and passed in explicitly, so tests can swap either.

use crate::classifier::{ErrorRecord, ErrorType};
use crate::errors::Result;
use crate::strategies::types::{PatchCandidate, StrategyId};
use crate::strategies::{database, diagnostics, exports, imports, react, typescript};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Strategy function signature; `Ok(None)` means "declined"
pub type StrategyFn =
    Arc<dyn Fn(&ErrorRecord, &StrategyContext) -> Result<Option<PatchCandidate>> + Send + Sync>;

/// Correction data and project location shared by all strategies
#[derive(Debug, Clone)]
pub struct StrategyContext {
    /// Root that relative error paths resolve against
    pub project_root: PathBuf,

    /// Module specifier to canonical import statement
    pub known_imports: Vec<(String, String)>,

    /// Misspelled specifier to correct one
    pub import_typos: Vec<(String, String)>,

    /// Singular table name to plural
    pub table_names: Vec<(String, String)>,
}

impl StrategyContext {
    /// Built-in correction tables rooted at `project_root`
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            known_imports: pairs(&[
                ("react", "import React from 'react';"),
                ("react-dom/client", "import { createRoot } from 'react-dom/client';"),
                ("@testing-library/react", "import { render, screen } from '@testing-library/react';"),
                ("@testing-library/jest-dom", "import '@testing-library/jest-dom';"),
                ("@testing-library/user-event", "import userEvent from '@testing-library/user-event';"),
                ("vitest", "import { describe, it, expect, vi } from 'vitest';"),
                ("react-router-dom", "import { BrowserRouter } from 'react-router-dom';"),
                ("@supabase/supabase-js", "import { createClient } from '@supabase/supabase-js';"),
            ]),
            import_typos: pairs(&[
                ("raect", "react"),
                ("reat", "react"),
                ("react-dom/clinet", "react-dom/client"),
                ("react-roter-dom", "react-router-dom"),
                ("react-router-dom/", "react-router-dom"),
                ("@testing-libary/react", "@testing-library/react"),
                ("@testing-library/raect", "@testing-library/react"),
                ("@supabase/supabase", "@supabase/supabase-js"),
                ("@supabase/supabse-js", "@supabase/supabase-js"),
                ("lodsh", "lodash"),
                ("date-fsn", "date-fns"),
            ]),
            table_names: pairs(&[
                ("user", "users"),
                ("wedding", "weddings"),
                ("guest", "guests"),
                ("rsvp", "rsvps"),
                ("event", "events"),
                ("vendor", "vendors"),
                ("task", "tasks"),
                ("invitation", "invitations"),
                ("photo", "photos"),
                ("post", "posts"),
                ("comment", "comments"),
                ("message", "messages"),
                ("profile", "profiles"),
            ]),
        }
    }

    /// Resolve an error-record path against the project root
    pub fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Read the file named by an error; `None` when the error has no file
    pub fn read_error_file(&self, error: &ErrorRecord) -> Result<Option<(PathBuf, String)>> {
        let Some(file) = &error.file else {
            return Ok(None);
        };
        let path = self.resolve(file);
        let content = std::fs::read_to_string(&path)?;
        Ok(Some((path, content)))
    }

    pub fn known_import(&self, module: &str) -> Option<&str> {
        self.known_imports
            .iter()
            .find(|(m, _)| m == module)
            .map(|(_, stmt)| stmt.as_str())
    }

    /// Case-insensitive singular lookup
    pub fn plural_table(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.table_names
            .iter()
            .find(|(singular, _)| *singular == lower)
            .map(|(_, plural)| plural.as_str())
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Ordered strategy ids per error type
#[derive(Debug, Clone)]
pub struct StrategyPlan {
    plan: HashMap<ErrorType, Vec<StrategyId>>,
}

impl StrategyPlan {
    /// Built-in plan
    pub fn builtin() -> Self {
        use StrategyId::*;

        let mut plan = HashMap::new();
        plan.insert(
            ErrorType::Import,
            vec![FixMissingImports, FixRelativePaths, FixTypoInImports, AddMissingPackages],
        );
        plan.insert(ErrorType::Export, vec![FixDefaultExports, FixNamedExports]);
        plan.insert(ErrorType::Typescript, vec![AddTypeAssertions, FixMissingProperties]);
        plan.insert(ErrorType::Database, vec![FixTableNames, FixColumnNames]);
        plan.insert(ErrorType::React, vec![FixPropTypes, FixHookDependencies, AddNullChecks]);
        plan.insert(ErrorType::Syntax, vec![ReviewSyntaxError]);
        plan.insert(ErrorType::Testing, vec![ReviewTestSelectors, ReviewAssertion]);

        Self { plan }
    }

    /// Plan with no entries
    pub fn empty() -> Self {
        Self {
            plan: HashMap::new(),
        }
    }

    /// Replace the strategy list for one type
    pub fn with(mut self, error_type: ErrorType, strategies: Vec<StrategyId>) -> Self {
        self.plan.insert(error_type, strategies);
        self
    }

    /// Strategies for a type; empty for `Unknown` or unmapped types
    pub fn strategies_for(&self, error_type: ErrorType) -> &[StrategyId] {
        self.plan
            .get(&error_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Strategy id to implementation
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<StrategyId, StrategyFn>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.strategies.keys().collect();
        ids.sort();
        f.debug_struct("StrategyRegistry").field("strategies", &ids).finish()
    }
}

impl StrategyRegistry {
    /// Registry holding every built-in strategy
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(StrategyId::FixMissingImports, imports::fix_missing_imports);
        registry.register(StrategyId::FixRelativePaths, imports::fix_relative_paths);
        registry.register(StrategyId::FixTypoInImports, imports::fix_typo_in_imports);
        registry.register(StrategyId::AddMissingPackages, imports::add_missing_packages);
        registry.register(StrategyId::FixDefaultExports, exports::fix_default_exports);
        registry.register(StrategyId::FixNamedExports, exports::fix_named_exports);
        registry.register(StrategyId::AddTypeAssertions, typescript::add_type_assertions);
        registry.register(StrategyId::FixMissingProperties, typescript::fix_missing_properties);
        registry.register(StrategyId::FixTableNames, database::fix_table_names);
        registry.register(StrategyId::FixColumnNames, database::fix_column_names);
        registry.register(StrategyId::FixPropTypes, react::fix_prop_types);
        registry.register(StrategyId::FixHookDependencies, react::fix_hook_dependencies);
        registry.register(StrategyId::AddNullChecks, react::add_null_checks);
        registry.register(StrategyId::ReviewSyntaxError, diagnostics::review_syntax_error);
        registry.register(StrategyId::ReviewTestSelectors, diagnostics::review_test_selectors);
        registry.register(StrategyId::ReviewAssertion, diagnostics::review_assertion);
        registry
    }

    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register or replace a strategy implementation
    pub fn register<F>(&mut self, id: StrategyId, strategy: F)
    where
        F: Fn(&ErrorRecord, &StrategyContext) -> Result<Option<PatchCandidate>> + Send + Sync + 'static,
    {
        self.strategies.insert(id, Arc::new(strategy));
    }

    pub fn get(&self, id: StrategyId) -> Option<&StrategyFn> {
        self.strategies.get(&id)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
