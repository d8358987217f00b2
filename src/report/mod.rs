//! Markdown session report
//!
//! Rendered from a finished `SessionOutcome` and rewritten on every run.

use crate::applier::{ApplyKind, ApplyResult};
use crate::classifier::analyzer::summarize;
use crate::config::ReportConfig;
use crate::errors::Result;
use crate::orchestrator::SessionOutcome;
use crate::strategies::StrategyId;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// List caps for the detailed sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub max_errors_listed: usize,
    pub max_patches_listed: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            max_errors_listed: 20,
            max_patches_listed: 30,
        }
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            max_errors_listed: config.max_errors_listed,
            max_patches_listed: config.max_patches_listed,
        }
    }
}

/// Per-strategy tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategyStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub suggestions: usize,
}

impl StrategyStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}

/// Group apply results by strategy
pub fn strategy_stats<'a>(results: impl IntoIterator<Item = &'a ApplyResult>) -> BTreeMap<StrategyId, StrategyStats> {
    let mut stats: BTreeMap<StrategyId, StrategyStats> = BTreeMap::new();
    for result in results {
        let entry = stats.entry(result.strategy).or_default();
        entry.attempted += 1;
        if result.success {
            entry.succeeded += 1;
        }
        if result.kind == ApplyKind::Suggestion {
            entry.suggestions += 1;
        }
    }
    stats
}

/// Markdown view over one outcome
pub struct MarkdownReport<'a> {
    outcome: &'a SessionOutcome,
    options: ReportOptions,
}

impl<'a> MarkdownReport<'a> {
    pub fn new(outcome: &'a SessionOutcome, options: ReportOptions) -> Self {
        Self { outcome, options }
    }

    /// Replace the report file, creating its directory
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_string())?;
        Ok(())
    }

    fn write_metadata(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.outcome;
        writeln!(f, "# Autopatch Report")?;
        writeln!(f)?;
        writeln!(f, "- **Session:** `{}`", o.session_id)?;
        writeln!(f, "- **Started:** {}", o.started_at.to_rfc3339())?;
        writeln!(f, "- **Finished:** {}", o.finished_at.to_rfc3339())?;
        writeln!(
            f,
            "- **Result:** {}",
            if o.final_success { "all tests passing" } else { "tests still failing" }
        )?;
        writeln!(f, "- **Halt reason:** `{}`", o.halt_reason)?;
        writeln!(f)
    }

    fn write_counts(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.outcome;
        let suggestions = o
            .patch_results()
            .filter(|r| r.kind == ApplyKind::Suggestion)
            .count();
        let failed = o.patch_results().filter(|r| !r.success).count();

        writeln!(f, "## Summary")?;
        writeln!(f)?;
        writeln!(f, "| Metric | Value |")?;
        writeln!(f, "|---|---|")?;
        writeln!(f, "| Cycles | {} |", o.cycles.len())?;
        writeln!(f, "| Errors detected | {} |", o.initial_errors.len())?;
        writeln!(f, "| Patches generated | {} |", o.total_patches)?;
        writeln!(f, "| Patches successful | {} |", o.successful_patches)?;
        writeln!(f, "| Suggestions | {} |", suggestions)?;
        writeln!(f, "| Patches failed | {} |", failed)?;
        writeln!(f)
    }

    fn write_suites(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Test Suites")?;
        writeln!(f)?;
        if self.outcome.initial_results.is_empty() {
            writeln!(f, "_No suites were run._")?;
            return writeln!(f);
        }
        writeln!(f, "| Suite | Status | Exit code | Duration (ms) |")?;
        writeln!(f, "|---|---|---|---|")?;
        for run in &self.outcome.initial_results {
            let status = if run.timed_out {
                "timed out"
            } else if run.success {
                "pass"
            } else {
                "fail"
            };
            let exit = run
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(f, "| {} | {} | {} | {} |", cell(&run.target), status, exit, run.duration_ms)?;
        }
        writeln!(f)
    }

    fn write_distribution(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = summarize(&self.outcome.initial_errors);

        writeln!(f, "## Error Distribution")?;
        writeln!(f)?;
        if summary.total == 0 {
            writeln!(f, "_No errors were classified._")?;
            return writeln!(f);
        }

        writeln!(f, "| Category | Count |")?;
        writeln!(f, "|---|---|")?;
        for (category, count) in &summary.by_category {
            writeln!(f, "| {} | {} |", category, count)?;
        }
        writeln!(f)?;

        writeln!(f, "| Severity | Count |")?;
        writeln!(f, "|---|---|")?;
        for (severity, count) in &summary.by_severity {
            writeln!(f, "| {} | {} |", severity, count)?;
        }
        writeln!(f)
    }

    fn write_errors(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = &self.outcome.initial_errors;
        if errors.is_empty() {
            return Ok(());
        }

        writeln!(f, "## Errors")?;
        writeln!(f)?;
        for (i, error) in errors.iter().take(self.options.max_errors_listed).enumerate() {
            let location = match (&error.file, error.line_number) {
                (Some(file), Some(line)) => format!("{}:{}", file, line),
                (Some(file), None) => file.clone(),
                (None, _) => "unknown file".to_string(),
            };
            writeln!(
                f,
                "{}. **{}** ({}) `{}`: {}",
                i + 1,
                error.error_type,
                error.severity,
                location,
                error.message.trim()
            )?;
        }
        if errors.len() > self.options.max_errors_listed {
            writeln!(
                f,
                "\n_...and {} more_",
                errors.len() - self.options.max_errors_listed
            )?;
        }
        writeln!(f)
    }

    fn write_strategies(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = strategy_stats(self.outcome.patch_results());
        if stats.is_empty() {
            return Ok(());
        }

        writeln!(f, "## Strategies")?;
        writeln!(f)?;
        writeln!(f, "| Strategy | Attempted | Succeeded | Suggestions | Success rate |")?;
        writeln!(f, "|---|---|---|---|---|")?;
        for (strategy, s) in &stats {
            writeln!(
                f,
                "| {} | {} | {} | {} | {:.0}% |",
                strategy,
                s.attempted,
                s.succeeded,
                s.suggestions,
                s.success_rate() * 100.0
            )?;
        }
        writeln!(f)
    }

    fn write_patches(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let results: Vec<&ApplyResult> = self.outcome.patch_results().collect();
        if results.is_empty() {
            return Ok(());
        }

        writeln!(f, "## Patches")?;
        writeln!(f)?;
        writeln!(f, "| Attempt | Strategy | File | Confidence | Outcome |")?;
        writeln!(f, "|---|---|---|---|---|")?;
        for result in results.iter().take(self.options.max_patches_listed) {
            writeln!(
                f,
                "| {} | {} | {} | {:.2} | {} |",
                result.attempt,
                result.strategy,
                cell(result.file.as_deref().unwrap_or("-")),
                result.confidence,
                outcome_label(result)
            )?;
        }
        if results.len() > self.options.max_patches_listed {
            writeln!(
                f,
                "\n_...and {} more_",
                results.len() - self.options.max_patches_listed
            )?;
        }
        writeln!(f)
    }

    fn write_timings(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.outcome.timings;
        writeln!(f, "## Performance")?;
        writeln!(f)?;
        writeln!(f, "| Phase | Duration (ms) |")?;
        writeln!(f, "|---|---|")?;
        writeln!(f, "| Initial tests | {} |", t.initial_tests_ms)?;
        writeln!(f, "| Error analysis | {} |", t.analysis_ms)?;
        writeln!(f, "| Patch cycles | {} |", t.cycles_ms)?;
        writeln!(f, "| Total | {} |", t.total_ms)?;
        writeln!(f)?;

        if !self.outcome.cycles.is_empty() {
            writeln!(f, "| Cycle | Generate | Apply | Re-test | Analyze |")?;
            writeln!(f, "|---|---|---|---|---|")?;
            for cycle in &self.outcome.cycles {
                let c = cycle.timings;
                writeln!(
                    f,
                    "| {} | {} | {} | {} | {} |",
                    cycle.attempt, c.generate_ms, c.apply_ms, c.retest_ms, c.analyze_ms
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_manual(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let manual = self.outcome.manual_interventions();
        writeln!(f, "## Manual Intervention")?;
        writeln!(f)?;
        if manual.is_empty() {
            return writeln!(f, "_Nothing requires manual attention._");
        }
        for result in manual {
            let detail = result
                .error
                .as_deref()
                .or(result.message.as_deref())
                .unwrap_or("no details");
            writeln!(
                f,
                "- [ ] `{}` ({}, {}): {}",
                result.file.as_deref().unwrap_or("unknown file"),
                result.strategy,
                outcome_label(result),
                detail
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_metadata(f)?;
        self.write_counts(f)?;
        self.write_suites(f)?;
        self.write_distribution(f)?;
        self.write_errors(f)?;
        self.write_strategies(f)?;
        self.write_patches(f)?;
        self.write_timings(f)?;
        self.write_manual(f)
    }
}

fn outcome_label(result: &ApplyResult) -> &'static str {
    match (result.kind, result.success) {
        (ApplyKind::Suggestion, _) => "suggestion",
        (ApplyKind::Applied, true) => "applied",
        (ApplyKind::Applied, false) => "failed",
    }
}

/// Table-safe text
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
