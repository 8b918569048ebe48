//! Spec execution engine
//!
//! Discovers spec files, launches them as child processes and drives the
//! bounded-parallel orchestration loop.

#![allow(dead_code)]

mod discovery;
mod launcher;
mod monitor;
mod scheduler;

pub use launcher::{LaunchError, ProcessLauncher, SpecExit, SpecLauncher, SPEC_PLACEHOLDER};
pub use scheduler::{Orchestrator, PlannedSpec, RunError, RunOptions, RunReport, SpecOutcome};
