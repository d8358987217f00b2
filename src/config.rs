//! Configuration for autopatch
//!
//! TOML with serde defaults on every section, so partial files are valid.
//! Lookup order: explicit path, `<project>/autopatch.toml`,
//! `~/.autopatch/config.toml`, built-in defaults.

use crate::applier::ApplierOptions;
use crate::classifier::Severity;
use crate::errors::{PatchError, Result};
use crate::orchestrator::LoopSettings;
use crate::runner::SuiteSpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Project-local config file name
pub const PROJECT_CONFIG_FILE: &str = "autopatch.toml";

/// Attempt bounds accepted by validation
pub const MAX_ATTEMPTS_RANGE: (u32, u32) = (1, 10);

/// Smallest accepted global timeout
pub const MIN_TIMEOUT_MS: u64 = 10_000;

/// Smallest accepted watch-mode debounce
pub const MIN_DEBOUNCE_MS: u64 = 100;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Patch cycles per run (1..=10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound on any single test invocation
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub error_analysis: ErrorAnalysisConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub patching: PatchingConfig,

    #[serde(default)]
    pub tests: TestsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysisConfig {
    /// Errors processed per cycle; the rest wait for a later cycle
    #[serde(default = "default_max_errors_per_cycle")]
    pub max_errors_per_cycle: usize,

    /// Demote patches below their severity threshold to suggestions
    #[serde(default = "default_true")]
    pub enforce_confidence_thresholds: bool,

    #[serde(default)]
    pub confidence_thresholds: ConfidenceThresholds,
}

/// Minimum confidence per severity before a patch may touch files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    #[serde(default = "default_critical")]
    pub critical: f64,
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_low")]
    pub low: f64,
}

impl ConfidenceThresholds {
    pub fn threshold(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("critical", self.critical),
            ("high", self.high),
            ("medium", self.medium),
            ("low", self.low),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub directory: PathBuf,

    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Holds `patches.jsonl` and `session.jsonl`
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_errors_listed")]
    pub max_errors_listed: usize,

    #[serde(default = "default_max_patches_listed")]
    pub max_patches_listed: usize,
}

/// Parsed and validated, never used to parallelise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_one")]
    pub max_concurrent_patches: usize,

    #[serde(default = "default_concurrent_tests")]
    pub max_concurrent_tests: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchingConfig {
    #[serde(default = "default_true")]
    pub validate_before_apply: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsConfig {
    #[serde(default = "default_suite_timeout_ms")]
    pub suite_timeout_ms: u64,

    #[serde(default = "default_file_timeout_ms")]
    pub file_timeout_ms: u64,

    /// argv for one file; `{file}` is substituted or the path appended
    #[serde(default = "default_file_command")]
    pub file_command: Vec<String>,

    /// argv of a long-running watch process
    #[serde(default = "default_watch_command")]
    pub watch_command: Vec<String>,

    /// Idle time before a partial watch batch is processed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_suites")]
    pub suites: Vec<SuiteSpec>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_max_errors_per_cycle() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_critical() -> f64 {
    0.95
}

// Every built-in strategy that edits files must clear its family's gate:
// import typos land at 0.7 (high), null checks at 0.6 (medium)
fn default_high() -> f64 {
    0.7
}

fn default_medium() -> f64 {
    0.6
}

fn default_low() -> f64 {
    0.5
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".autopatch/backups")
}

fn default_retention_days() -> u64 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".autopatch/logs")
}

fn default_report_path() -> PathBuf {
    PathBuf::from(".autopatch/report.md")
}

fn default_max_errors_listed() -> usize {
    20
}

fn default_max_patches_listed() -> usize {
    30
}

fn default_one() -> usize {
    1
}

fn default_concurrent_tests() -> usize {
    3
}

fn default_suite_timeout_ms() -> u64 {
    300_000
}

fn default_file_timeout_ms() -> u64 {
    120_000
}

fn default_file_command() -> Vec<String> {
    ["npx", "vitest", "run", "{file}"].iter().map(|s| s.to_string()).collect()
}

fn default_watch_command() -> Vec<String> {
    ["npx", "vitest", "--watch"].iter().map(|s| s.to_string()).collect()
}

fn default_debounce_ms() -> u64 {
    1_500
}

fn default_suites() -> Vec<SuiteSpec> {
    vec![SuiteSpec::new("unit", &["npx", "vitest", "run"])]
}

impl Default for ErrorAnalysisConfig {
    fn default() -> Self {
        Self {
            max_errors_per_cycle: default_max_errors_per_cycle(),
            enforce_confidence_thresholds: true,
            confidence_thresholds: ConfidenceThresholds::default(),
        }
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            critical: default_critical(),
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: default_backup_dir(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: default_report_path(),
            max_errors_listed: default_max_errors_listed(),
            max_patches_listed: default_max_patches_listed(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_patches: default_one(),
            max_concurrent_tests: default_concurrent_tests(),
        }
    }
}

impl Default for PatchingConfig {
    fn default() -> Self {
        Self {
            validate_before_apply: true,
        }
    }
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            suite_timeout_ms: default_suite_timeout_ms(),
            file_timeout_ms: default_file_timeout_ms(),
            file_command: default_file_command(),
            watch_command: default_watch_command(),
            debounce_ms: default_debounce_ms(),
            suites: default_suites(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_attempts: default_max_attempts(),
            timeout_ms: default_timeout_ms(),
            error_analysis: ErrorAnalysisConfig::default(),
            backup: BackupConfig::default(),
            logging: LoggingConfig::default(),
            report: ReportConfig::default(),
            performance: PerformanceConfig::default(),
            patching: PatchingConfig::default(),
            tests: TestsConfig::default(),
        }
    }
}

impl Config {
    /// Resolve and load configuration; returns the file used, if any
    pub fn load(explicit: Option<&Path>, project_root: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        let project_file = project_root.join(PROJECT_CONFIG_FILE);
        if project_file.is_file() {
            return Ok((Self::from_file(&project_file)?, Some(project_file)));
        }

        if let Some(user_file) = Self::user_config_path() {
            if user_file.is_file() {
                return Ok((Self::from_file(&user_file)?, Some(user_file)));
            }
        }

        Ok((Self::default(), None))
    }

    /// Parse one TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PatchError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
            .map_err(|e| PatchError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| PatchError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PatchError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// `~/.autopatch/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".autopatch").join("config.toml"))
    }

    /// Startup validation; any failure is fatal
    pub fn validate(&self) -> Result<()> {
        let (min, max) = MAX_ATTEMPTS_RANGE;
        if !(min..=max).contains(&self.max_attempts) {
            return Err(PatchError::Config(format!(
                "max_attempts must be between {} and {}, got {}",
                min, max, self.max_attempts
            )));
        }

        if self.timeout_ms < MIN_TIMEOUT_MS {
            return Err(PatchError::Config(format!(
                "timeout_ms must be at least {}, got {}",
                MIN_TIMEOUT_MS, self.timeout_ms
            )));
        }

        if self.error_analysis.max_errors_per_cycle == 0 {
            return Err(PatchError::Config(
                "error_analysis.max_errors_per_cycle must be at least 1".to_string(),
            ));
        }

        for (name, value) in self.error_analysis.confidence_thresholds.entries() {
            if !(0.0..=1.0).contains(&value) {
                return Err(PatchError::Config(format!(
                    "confidence threshold '{}' must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(PatchError::Config(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        if self.performance.max_concurrent_patches == 0 || self.performance.max_concurrent_tests == 0 {
            return Err(PatchError::Config(
                "performance limits must be at least 1".to_string(),
            ));
        }

        if self.tests.suites.is_empty() {
            return Err(PatchError::Config(
                "at least one [[tests.suites]] entry is required".to_string(),
            ));
        }
        for suite in &self.tests.suites {
            if suite.name.trim().is_empty() || suite.command.is_empty() {
                return Err(PatchError::Config(format!(
                    "test suite '{}' needs a name and a command",
                    suite.name
                )));
            }
        }

        if self.tests.debounce_ms < MIN_DEBOUNCE_MS {
            return Err(PatchError::Config(format!(
                "tests.debounce_ms must be at least {}, got {}",
                MIN_DEBOUNCE_MS, self.tests.debounce_ms
            )));
        }

        if self.tests.file_command.is_empty() {
            return Err(PatchError::Config(
                "tests.file_command must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve a configured path against the project root
    pub fn resolve(project_root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_root.join(path)
        }
    }

    pub fn backup_dir(&self, project_root: &Path) -> PathBuf {
        Self::resolve(project_root, &self.backup.directory)
    }

    pub fn patch_log_path(&self, project_root: &Path) -> PathBuf {
        Self::resolve(project_root, &self.logging.directory).join("patches.jsonl")
    }

    pub fn session_log_path(&self, project_root: &Path) -> PathBuf {
        Self::resolve(project_root, &self.logging.directory).join("session.jsonl")
    }

    pub fn report_path(&self, project_root: &Path) -> PathBuf {
        Self::resolve(project_root, &self.report.path)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_attempts: self.max_attempts,
            max_errors_per_cycle: self.error_analysis.max_errors_per_cycle,
        }
    }

    pub fn applier_options(&self) -> ApplierOptions {
        ApplierOptions {
            enforce_thresholds: self.error_analysis.enforce_confidence_thresholds,
            thresholds: self.error_analysis.confidence_thresholds,
            validate_before_apply: self.patching.validate_before_apply,
        }
    }
}
