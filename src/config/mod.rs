//! Configuration module
//!
//! Settings are layered: built-in defaults, then a config file, then
//! `SMART_RUNNER_*` environment variables, then command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{expand_path, find_config};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::{ProcessLauncher, SPEC_PLACEHOLDER};
use crate::hashing::{RelativeResolver, DEFAULT_EXTENSIONS};
use crate::store::JsonFileStore;

/// Per-spec timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory searched for spec files
    pub spec_root: PathBuf,

    /// File name suffix identifying a spec
    pub spec_suffix: String,

    /// Program used to run one spec
    pub command: String,

    /// Arguments for `command`; `{spec}` is replaced by the spec path
    pub args: Vec<String>,

    /// Statistics document; defaults to a file in the temp directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Upper bound on parallel spec processes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Per-spec timeout in seconds, 0 disables
    pub timeout_secs: u64,

    /// Revision recorded with each result
    pub branch: String,
    pub commit: String,

    /// Extensions tried when resolving extensionless imports
    pub extensions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spec_root: PathBuf::from("cypress/e2e"),
            spec_suffix: ".cy.ts".to_string(),
            command: "pnpm".to_string(),
            args: ["cypress", "run", "--spec", SPEC_PLACEHOLDER]
                .map(String::from)
                .to_vec(),
            store_path: None,
            max_parallel: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            branch: "master".to_string(),
            commit: "HEAD".to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from the first standard location, or defaults if none exists
    pub fn load_default() -> Result<Self> {
        match find_config() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.render(path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Serialize in the format implied by `path`'s extension
    pub fn render(&self, path: &Path) -> Result<String> {
        if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.spec_suffix.is_empty() {
            anyhow::bail!("spec_suffix must not be empty");
        }
        if self.command.trim().is_empty() {
            anyhow::bail!("command must not be empty");
        }
        if self.max_parallel == Some(0) {
            anyhow::bail!("max_parallel must be at least 1");
        }
        Ok(())
    }

    /// Apply environment overrides on top of this config
    pub fn merge_env(&mut self, env: &EnvConfig) {
        if let Some(root) = &env.spec_root {
            self.spec_root = PathBuf::from(root);
        }
        if let Some(suffix) = &env.spec_suffix {
            self.spec_suffix = suffix.clone();
        }
        if let Some(command) = &env.command {
            self.command = command.clone();
        }
        if let Some(store) = &env.store_path {
            self.store_path = Some(PathBuf::from(store));
        }
        if let Some(max) = env.max_parallel {
            self.max_parallel = Some(max);
        }
        if let Some(timeout) = env.timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(branch) = &env.branch {
            self.branch = branch.clone();
        }
        if let Some(commit) = &env.commit {
            self.commit = commit.clone();
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(JsonFileStore::default_path)
    }

    pub fn launcher(&self) -> ProcessLauncher {
        ProcessLauncher::new(self.command.clone(), self.args.clone())
    }

    pub fn resolver(&self) -> RelativeResolver {
        RelativeResolver::with_extensions(self.extensions.clone())
    }
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
