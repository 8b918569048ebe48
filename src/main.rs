//! smart-runner - history-driven parallel runner for end-to-end specs
//!
//! Discovers spec files, fingerprints them together with their direct
//! imports, and runs them in priority order with bounded parallelism. Specs
//! whose content is unchanged and whose recent history is stable and fast are
//! skipped, reusing their last verdict.
//!
//! ## Usage
//!
//! ```bash
//! # Run everything under cypress/e2e
//! smart-runner run
//!
//! # Preview the queue and which specs would be skipped
//! smart-runner plan --spec-root cypress/e2e
//!
//! # Inspect history
//! smart-runner results -n 50 --format csv
//! smart-runner suites
//! smart-runner trends
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;
mod config;
mod control;
mod executor;
mod hashing;
mod models;
mod output;
mod planner;
mod store;
mod utils;

use cli::Args;
use config::{AppConfig, EnvConfig};
use control::RunController;
use executor::{Orchestrator, RunOptions};
use hashing::DependencyHasher;
use output::{OutputFormat, ResultFormatter};
use planner::SystemResources;
use store::{JsonFileStore, StatisticsStore, StatsDb};
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(LogLevel::from_verbosity(args.verbose));

    let env = EnvConfig::load();
    let mut config = load_config(&args, &env)?;
    config.merge_env(&env);
    if let Some(store) = &args.store {
        config.store_path = Some(store.clone());
    }

    match args.command {
        cli::Command::Run(run_args) => {
            apply_discovery(&mut config, &run_args.discovery);
            if run_args.max_parallel.is_some() {
                config.max_parallel = run_args.max_parallel;
            }
            if let Some(timeout) = run_args.timeout {
                config.timeout_secs = timeout;
            }
            if let Some(branch) = run_args.branch {
                config.branch = branch;
            }
            if let Some(commit) = run_args.commit {
                config.commit = commit;
            }
            config.validate()?;

            let success = run_specs(&config, &run_args.format).await?;
            if !success {
                std::process::exit(1);
            }
        }
        cli::Command::Plan(plan_args) => {
            apply_discovery(&mut config, &plan_args.discovery);
            let orchestrator = build_orchestrator(&config)?;
            let plan = orchestrator.plan()?;
            println!("{}", formatter(&plan_args.format).format_plan(&plan));
        }
        cli::Command::Results(results_args) => {
            let db = open_store(&config)?;
            let results = db.recent_results(results_args.limit);
            println!("{}", formatter(&results_args.format).format_results(&results));
        }
        cli::Command::Suites(format_args) => {
            let db = open_store(&config)?;
            println!(
                "{}",
                formatter(&format_args.format).format_suites(&db.test_suites())
            );
        }
        cli::Command::Trends(format_args) => {
            let db = open_store(&config)?;
            println!(
                "{}",
                formatter(&format_args.format).format_trends(&db.performance_trends())
            );
        }
        cli::Command::Stats(format_args) => {
            let db = open_store(&config)?;
            println!("{}", formatter(&format_args.format).format_stats(&db.stats()));
        }
        cli::Command::Rebuild => {
            let db = open_store(&config)?;
            db.rebuild_derived()?;
            let stats = db.stats();
            info!(
                "Rebuilt baselines from {} results ({:.1}% passed)",
                stats.total_runs,
                stats.pass_rate * 100.0
            );
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &config)?;
        }
    }

    Ok(())
}

fn load_config(args: &Args, env: &EnvConfig) -> Result<AppConfig> {
    let explicit = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(|p| config::expand_path(p)));
    match explicit {
        Some(path) => AppConfig::load(path),
        None => AppConfig::load_default(),
    }
}

fn apply_discovery(config: &mut AppConfig, discovery: &cli::DiscoveryArgs) {
    if let Some(root) = &discovery.spec_root {
        config.spec_root = root.clone();
    }
    if let Some(suffix) = &discovery.suffix {
        config.spec_suffix = suffix.clone();
    }
}

fn formatter(format: &str) -> ResultFormatter {
    let format = OutputFormat::from_str(format).unwrap_or_else(|| {
        warn!("Unknown output format '{}', using table", format);
        OutputFormat::Table
    });
    ResultFormatter::new(format)
}

fn open_store(config: &AppConfig) -> Result<Arc<StatsDb>> {
    let path = config.store_path();
    let backend: Arc<dyn StatisticsStore> = Arc::new(JsonFileStore::new(&path));
    let db = StatsDb::open(backend)
        .with_context(|| format!("Failed to open statistics store {}", path.display()))?;
    Ok(Arc::new(db))
}

fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let db = open_store(config)?;
    let hasher = DependencyHasher::new(Arc::new(config.resolver()));
    let launcher = Arc::new(config.launcher());

    let mut options = RunOptions::new(&config.spec_root, SystemResources::detect());
    options.spec_suffix = config.spec_suffix.clone();
    options.max_parallel = config.max_parallel;
    options.timeout = config.timeout();
    options.branch = config.branch.clone();
    options.commit = config.commit.clone();

    Ok(Orchestrator::new(db, hasher, launcher, options))
}

/// Run all specs; returns whether every spec passed or was cached
async fn run_specs(config: &AppConfig, format: &str) -> Result<bool> {
    let controller = Arc::new(RunController::new(build_orchestrator(config)?));

    let interrupt = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping run");
                controller.stop_run();
            }
        })
    };

    let report = controller.run_to_completion().await;
    interrupt.abort();
    let report = report?;

    println!("{}", formatter(format).format_report(&report));
    Ok(report.all_passed())
}

fn manage_config(args: cli::ConfigArgs, effective: &AppConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                );
            }
            AppConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        cli::ConfigAction::Show { format } => {
            let extension = if format.eq_ignore_ascii_case("json") {
                "json"
            } else {
                "yaml"
            };
            let rendered = effective.render(std::path::Path::new(&format!("config.{extension}")))?;
            println!("{rendered}");
        }
        cli::ConfigAction::Env => {
            config::print_env_help();
        }
    }
    Ok(())
}
