//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "SMART_RUNNER";

/// Overrides read from `SMART_RUNNER_*` variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Spec root from SMART_RUNNER_SPEC_ROOT
    pub spec_root: Option<String>,
    /// Spec suffix from SMART_RUNNER_SPEC_SUFFIX
    pub spec_suffix: Option<String>,
    /// Launch program from SMART_RUNNER_COMMAND
    pub command: Option<String>,
    /// Store file from SMART_RUNNER_STORE
    pub store_path: Option<String>,
    /// Parallelism cap from SMART_RUNNER_MAX_PARALLEL
    pub max_parallel: Option<usize>,
    /// Timeout from SMART_RUNNER_TIMEOUT
    pub timeout_secs: Option<u64>,
    /// Branch from SMART_RUNNER_BRANCH
    pub branch: Option<String>,
    /// Commit from SMART_RUNNER_COMMIT
    pub commit: Option<String>,
    /// Config file from SMART_RUNNER_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            spec_root: get_env("SPEC_ROOT"),
            spec_suffix: get_env("SPEC_SUFFIX"),
            command: get_env("COMMAND"),
            store_path: get_env("STORE"),
            max_parallel: get_env_parse("MAX_PARALLEL"),
            timeout_secs: get_env_parse("TIMEOUT"),
            branch: get_env("BRANCH"),
            commit: get_env("COMMIT"),
            config_file: get_env("CONFIG"),
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Print all SMART_RUNNER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_SPEC_ROOT     Directory searched for specs");
    println!("  {ENV_PREFIX}_SPEC_SUFFIX   Spec file suffix (default .cy.ts)");
    println!("  {ENV_PREFIX}_COMMAND       Program that runs one spec");
    println!("  {ENV_PREFIX}_STORE         Path to the statistics JSON file");
    println!("  {ENV_PREFIX}_MAX_PARALLEL  Cap on parallel spec processes");
    println!("  {ENV_PREFIX}_TIMEOUT       Per-spec timeout in seconds (0 disables)");
    println!("  {ENV_PREFIX}_BRANCH        Branch recorded with results");
    println!("  {ENV_PREFIX}_COMMIT        Commit recorded with results");
    println!("  {ENV_PREFIX}_CONFIG        Path to configuration file");
    println!("  RUST_LOG                   Log filter, overrides --verbose");
}
