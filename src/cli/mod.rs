//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// History-driven parallel spec runner
#[derive(Parser, Debug)]
#[command(name = "smart-runner")]
#[command(version = "0.1.0")]
#[command(about = "Run end-to-end specs in parallel, skipping stable unchanged ones")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Statistics store file
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover, prioritize and run specs
    Run(RunArgs),

    /// Show the ordered queue and cache decisions without running
    Plan(PlanArgs),

    /// Show the most recent results
    Results(ResultsArgs),

    /// Show per-suite aggregates
    Suites(FormatArgs),

    /// Show the performance trend series
    Trends(FormatArgs),

    /// Show overall history statistics
    Stats(FormatArgs),

    /// Recompute baselines and statistics from the stored history
    Rebuild,

    /// Manage configuration
    Config(ConfigArgs),
}

/// Discovery settings shared by `run` and `plan`
#[derive(Parser, Debug, Default)]
pub struct DiscoveryArgs {
    /// Directory searched for specs
    #[arg(short = 'r', long)]
    pub spec_root: Option<PathBuf>,

    /// Spec file name suffix
    #[arg(long)]
    pub suffix: Option<String>,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,

    /// Cap on parallel spec processes
    #[arg(short = 'j', long)]
    pub max_parallel: Option<usize>,

    /// Per-spec timeout in seconds (0 disables)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Branch recorded with results
    #[arg(long)]
    pub branch: Option<String>,

    /// Commit recorded with results
    #[arg(long)]
    pub commit: Option<String>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Number of results to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

#[derive(Parser, Debug)]
pub struct FormatArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Destination (yaml or json by extension)
        #[arg(default_value = "smart-runner.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// List supported environment variables
    Env,
}
