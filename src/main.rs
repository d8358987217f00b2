//! autopatch - Main CLI Entry Point
//!
//! Exit codes: 0 all tests pass (or command succeeded), 1 tests still
//! failing, 2 infrastructure or configuration failure.

use anyhow::{anyhow, Result};
use autopatch::{
    applier::{BackupStore, PatchApplier},
    classifier::ErrorClassifier,
    cli::{Args, Commands, Verbosity},
    config::Config,
    orchestrator::{PatchOrchestrator, SessionOutcome},
    report::{MarkdownReport, ReportOptions},
    runner::CommandTestRunner,
    session::SessionLog,
    strategies::PatchStrategyEngine,
    watch::WatchSession,
};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_FAILING: i32 = 1;
const EXIT_FAULT: i32 = 2;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            EXIT_FAULT
        }
    };

    std::process::exit(code);
}

async fn run(args: Args) -> Result<i32> {
    args.validate().map_err(|e| anyhow!(e))?;

    let project_root = args.project_root();
    let (mut config, source) = Config::load(args.config.as_deref(), &project_root)?;
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    config.validate()?;

    init_logging(args.verbosity(), &config);
    match &source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("using built-in configuration"),
    }

    match args.command() {
        Commands::Run => run_session(&args, &config, &project_root).await,
        Commands::Test => {
            config.max_attempts = 1;
            run_session(&args, &config, &project_root).await
        }
        Commands::Watch => run_watch(&config, &project_root).await,
        Commands::Cleanup { days } => cleanup(&config, &project_root, days),
        Commands::Config => show_config(&config, source.as_deref()),
    }
}

/// `RUST_LOG`, then -v/-q, then `logging.level`
fn init_logging(verbosity: Verbosity, config: &Config) {
    let fallback = verbosity
        .log_level()
        .unwrap_or(config.logging.level.as_str())
        .to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cancel_on_ctrl_c(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current phase");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

fn pipeline(config: &Config, project_root: &Path) -> Result<(ErrorClassifier, PatchStrategyEngine, PatchApplier, SessionLog)> {
    let classifier = ErrorClassifier::new()?;
    let engine = PatchStrategyEngine::builtin(project_root);
    let applier = PatchApplier::new(
        config.backup_dir(project_root),
        config.patch_log_path(project_root),
        config.applier_options(),
    )?;
    let session = SessionLog::new(config.session_log_path(project_root))?;
    Ok((classifier, engine, applier, session))
}

async fn run_session(args: &Args, config: &Config, project_root: &Path) -> Result<i32> {
    let verbosity = args.verbosity();
    let (classifier, engine, applier, session) = pipeline(config, project_root)?;
    let runner = CommandTestRunner::from_config(config, project_root);

    let cancel = Arc::new(AtomicBool::new(false));
    cancel_on_ctrl_c(Arc::clone(&cancel));

    let mut orchestrator = PatchOrchestrator::new(
        runner,
        classifier,
        engine,
        applier,
        session,
        config.loop_settings(),
    )
    .with_cancel_flag(cancel);

    let spinner = verbosity.show_progress().then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });
    if let Some(pb) = &spinner {
        let pb = pb.clone();
        orchestrator = orchestrator.with_progress(Arc::new(move |msg: &str| pb.set_message(msg.to_string())));
    }

    let result = orchestrator.run().await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let outcome = result?;

    let report_path = config.report_path(project_root);
    MarkdownReport::new(&outcome, ReportOptions::from(&config.report)).write_to(&report_path)?;

    print_summary(&outcome, &report_path, verbosity);
    Ok(if outcome.final_success { 0 } else { EXIT_FAILING })
}

fn print_summary(outcome: &SessionOutcome, report_path: &Path, verbosity: Verbosity) {
    let status = if outcome.final_success {
        "✓ All tests passing".green().bold()
    } else {
        "✗ Tests still failing".red().bold()
    };
    println!("{} ({})", status, outcome.halt_reason);

    if verbosity == Verbosity::Quiet {
        return;
    }

    println!("  Cycles:      {}", outcome.cycles.len());
    println!(
        "  Patches:     {} generated, {} successful",
        outcome.total_patches, outcome.successful_patches
    );
    let manual = outcome.manual_interventions();
    if !manual.is_empty() {
        println!(
            "  {}",
            format!("{} item(s) need manual attention", manual.len()).yellow()
        );
    }
    println!("  Report:      {}", report_path.display());
}

async fn run_watch(config: &Config, project_root: &Path) -> Result<i32> {
    let (classifier, engine, applier, session) = pipeline(config, project_root)?;
    let mut watch = WatchSession::new(classifier, engine, applier, session);

    let cancel = Arc::new(AtomicBool::new(false));
    cancel_on_ctrl_c(Arc::clone(&cancel));

    println!("{} {}", "Watching:".cyan().bold(), config.tests.watch_command.join(" "));
    let stats = watch
        .run(
            &config.tests.watch_command,
            project_root,
            Duration::from_millis(config.tests.debounce_ms),
            cancel,
        )
        .await?;

    println!(
        "{} {} batch(es), {} error(s), {} patch(es), {} successful",
        "Watch stopped:".cyan().bold(),
        stats.batches,
        stats.errors,
        stats.patches,
        stats.succeeded
    );
    Ok(0)
}

fn cleanup(config: &Config, project_root: &Path, days: Option<u64>) -> Result<i32> {
    let days = days.unwrap_or(config.backup.retention_days);
    let store = BackupStore::new(config.backup_dir(project_root))?;
    let removed = store.clean(days)?;

    println!(
        "{} Removed {} backup(s) older than {} day(s) from {}",
        "✓".green(),
        removed,
        days,
        store.dir().display()
    );
    Ok(0)
}

fn show_config(config: &Config, source: Option<&Path>) -> Result<i32> {
    match source {
        Some(path) => println!("{} {}", "# Loaded from".dimmed(), path.display()),
        None => println!("{}", "# Built-in defaults".dimmed()),
    }
    print!("{}", config.to_toml()?);
    Ok(0)
}
