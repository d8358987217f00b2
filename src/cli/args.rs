//! Command-line argument parsing for autopatch
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// autopatch - classify failing tests and patch the code behind them
#[derive(Parser, Debug)]
#[command(name = "autopatch")]
#[command(version)]
#[command(about = "Run tests, classify failures and apply automatic patches", long_about = None)]
pub struct Args {
    /// Project root (current directory by default)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured number of patch cycles
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except the final result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand (`run` when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run tests, patch failures and write the report
    Run,

    /// Follow a test watcher and patch each failing batch
    Watch,

    /// Delete backups older than the retention period
    Cleanup {
        /// Retention in days (configured value by default)
        #[arg(long)]
        days: Option<u64>,
    },

    /// Same as `run` with a single patch cycle
    Test,

    /// Display the effective configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Subcommand to execute
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// Get project root (current dir if not specified)
    pub fn project_root(&self) -> PathBuf {
        self.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.quiet && self.verbose > 0 {
            return Err("Cannot combine --quiet with --verbose.".to_string());
        }
        if self.max_attempts == Some(0) {
            return Err("--max-attempts must be at least 1.".to_string());
        }
        Ok(())
    }
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log level forced by the flags; `None` defers to configuration
    pub fn log_level(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("debug"),
            Verbosity::VeryVerbose => Some("trace"),
        }
    }

    /// Check if should show the progress spinner
    pub fn show_progress(&self) -> bool {
        matches!(self, Verbosity::Normal)
    }
}
