//! Spec process launching
//!
//! A launcher turns a spec path into a finished process exit. Cancellation is
//! by drop: dropping the future returned by [`SpecLauncher::run`] must stop the
//! underlying process.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::monitor::{ResourceMonitor, ResourceUsage, SAMPLE_INTERVAL};

/// Placeholder replaced by the spec path in launcher arguments
pub const SPEC_PLACEHOLDER: &str = "{spec}";

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for spec process: {0}")]
    Wait(#[source] std::io::Error),
}

/// How a spec process ended
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpecExit {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr
    pub output: String,
    pub usage: ResourceUsage,
}

impl SpecExit {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait SpecLauncher: Send + Sync {
    /// Run one spec to completion
    async fn run(&self, spec: &Path) -> Result<SpecExit, LaunchError>;
}

/// Runs each spec as `program args...` with `{spec}` substituted
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(
            "pnpm",
            ["cypress", "run", "--spec", SPEC_PLACEHOLDER].map(String::from),
        )
    }
}

impl ProcessLauncher {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
            env: vec![("FORCE_COLOR".to_string(), "true".to_string())],
        }
    }

    /// Arguments for `spec`; the path is appended when no placeholder is present
    pub fn args_for(&self, spec: &Path) -> Vec<String> {
        let spec = spec.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(SPEC_PLACEHOLDER, &spec))
            .collect();
        if !self.args.iter().any(|a| a.contains(SPEC_PLACEHOLDER)) {
            args.push(spec.into_owned());
        }
        args
    }

    pub fn command_line(&self, spec: &Path) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args_for(spec))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl SpecLauncher for ProcessLauncher {
    async fn run(&self, spec: &Path) -> Result<SpecExit, LaunchError> {
        let mut command = Command::new(&self.program);
        command
            .args(self.args_for(spec))
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Launching {}", self.command_line(spec));
        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let monitor = child
            .id()
            .map(|pid| ResourceMonitor::spawn(pid, SAMPLE_INTERVAL));

        let output = Arc::new(Mutex::new(String::new()));
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, _, _) = tokio::join!(
            child.wait(),
            collect_lines(stdout, output.clone()),
            collect_lines(stderr, output.clone()),
        );
        let status = status.map_err(LaunchError::Wait)?;
        let usage = monitor.map(ResourceMonitor::finish).unwrap_or_default();

        let output = std::mem::take(&mut *output.lock());
        Ok(SpecExit {
            exit_code: status.code(),
            output,
            usage,
        })
    }
}

/// Append every line of `reader` to the shared combined-output buffer
async fn collect_lines<R>(reader: Option<R>, sink: Arc<Mutex<String>>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut buffer = sink.lock();
        buffer.push_str(&line);
        buffer.push('\n');
    }
}
