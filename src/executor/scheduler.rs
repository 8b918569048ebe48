//! Orchestration loop
//!
//! Discovers specs, orders them, gates them against the cache and keeps up to
//! `max_parallel` spec processes in flight. Each completion is recorded in the
//! statistics store as soon as it arrives and frees its slot immediately.

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::discovery::{find_spec_files, DiscoveryError};
use super::launcher::SpecLauncher;
use crate::hashing::DependencyHasher;
use crate::models::{PerformanceSample, SpecDescriptor, TestResult, TestStatus};
use crate::planner::{
    order_specs, CacheGate, ConcurrencyAdvisor, GateDecision, PriorityFactors, PriorityScorer,
    SystemResources,
};
use crate::store::{stats, StatsDb, StoreError, TrendPoint};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to persist run state: {0}")]
    Store(#[from] StoreError),

    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("Run task failed: {0}")]
    Task(String),
}

/// Settings fixed for the lifetime of an orchestrator
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub spec_root: PathBuf,
    pub spec_suffix: String,
    /// Hard cap applied on top of the advisor's recommendation
    pub max_parallel: Option<usize>,
    /// Per-spec limit; the process is killed when it is exceeded
    pub timeout: Option<Duration>,
    pub branch: String,
    pub commit: String,
    pub resources: SystemResources,
}

impl RunOptions {
    pub fn new(spec_root: impl Into<PathBuf>, resources: SystemResources) -> Self {
        Self {
            spec_root: spec_root.into(),
            spec_suffix: ".cy.ts".to_string(),
            max_parallel: None,
            timeout: None,
            branch: "master".to_string(),
            commit: "HEAD".to_string(),
            resources,
        }
    }
}

/// Final state of one spec in a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecOutcome {
    Passed,
    Failed,
    /// Cache gate allowed reuse of the previous verdict
    Skipped,
    /// Killed by a stop request; nothing was recorded
    Aborted,
}

impl SpecOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecOutcome::Passed => "passed",
            SpecOutcome::Failed => "failed",
            SpecOutcome::Skipped => "skipped",
            SpecOutcome::Aborted => "aborted",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SpecOutcome::Passed | SpecOutcome::Skipped)
    }
}

/// Summary returned when a run finishes
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub max_parallel: usize,
    pub outcomes: BTreeMap<String, SpecOutcome>,
    /// Results recorded in the store during this run, in completion order
    pub executed: Vec<TestResult>,
    /// Specs still queued when the run was stopped
    pub not_started: Vec<String>,
    pub stopped: bool,
}

impl RunReport {
    /// Pass/fail per spec; skipped specs count as passed
    pub fn results(&self) -> BTreeMap<String, bool> {
        self.outcomes
            .iter()
            .map(|(spec, outcome)| (spec.clone(), outcome.is_success()))
            .collect()
    }

    pub fn count(&self, outcome: SpecOutcome) -> usize {
        self.outcomes.values().filter(|o| **o == outcome).count()
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.values().all(SpecOutcome::is_success) && self.not_started.is_empty()
    }

    /// Snapshot for the performance trend series
    pub fn trend_point(&self) -> TrendPoint {
        let passed = self.outcomes.values().filter(|o| o.is_success()).count();
        TrendPoint {
            date: self.started_at,
            avg_duration_ms: stats::mean(self.executed.iter().map(|r| r.duration_ms as f64))
                .unwrap_or(0.0),
            pass_rate: if self.outcomes.is_empty() {
                0.0
            } else {
                passed as f64 / self.outcomes.len() as f64
            },
            parallelism: self.max_parallel,
        }
    }
}

/// A discovered spec with the reasons behind its place in the queue
#[derive(Clone, Debug, Serialize)]
pub struct PlannedSpec {
    pub spec: SpecDescriptor,
    pub decision: GateDecision,
    pub factors: Option<PriorityFactors>,
}

pub struct Orchestrator {
    db: Arc<StatsDb>,
    hasher: DependencyHasher,
    launcher: Arc<dyn SpecLauncher>,
    options: RunOptions,
    active: Mutex<BTreeMap<String, DateTime<Utc>>>,
    stop: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(
        db: Arc<StatsDb>,
        hasher: DependencyHasher,
        launcher: Arc<dyn SpecLauncher>,
        options: RunOptions,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            db,
            hasher,
            launcher,
            options,
            active: Mutex::new(BTreeMap::new()),
            stop,
        }
    }

    pub fn db(&self) -> &Arc<StatsDb> {
        &self.db
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Stop launching queued specs and kill the ones in flight
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Clear a previous stop request so the next run can proceed
    pub fn reset_stop(&self) {
        self.stop.send_replace(false);
    }

    /// Specs currently running, as pending results timed from their launch
    pub fn active_tests(&self) -> Vec<TestResult> {
        let now = Utc::now();
        self.active
            .lock()
            .iter()
            .map(|(spec, started)| {
                let elapsed = (now - *started).num_milliseconds().max(0) as u64;
                TestResult::new(spec.clone(), TestStatus::Pending, elapsed)
                    .with_timestamp(*started)
                    .with_revision(&self.options.branch, &self.options.commit)
            })
            .collect()
    }

    /// Hash, score and order every spec under the root
    pub fn discover(&self) -> Result<Vec<SpecDescriptor>, RunError> {
        let files = find_spec_files(&self.options.spec_root, &self.options.spec_suffix)?;
        let scorer = PriorityScorer::new(&self.db);

        let mut specs = Vec::with_capacity(files.len());
        for path in files {
            let hash = self
                .hasher
                .compute_hash(&path)
                .map_err(|source| DiscoveryError::Read {
                    path: path.clone(),
                    source,
                })?;
            let priority = scorer.compute_priority(&path.to_string_lossy());
            specs.push(SpecDescriptor::new(path, priority, hash));
        }

        order_specs(&mut specs);
        Ok(specs)
    }

    /// Ordered queue with gate decisions, without running anything
    pub fn plan(&self) -> Result<Vec<PlannedSpec>, RunError> {
        let gate = CacheGate::new(&self.db);
        let scorer = PriorityScorer::new(&self.db);
        Ok(self
            .discover()?
            .into_iter()
            .map(|spec| {
                let key = spec.key();
                PlannedSpec {
                    decision: gate.decide(&key, &spec.dependency_hash),
                    factors: scorer.score_breakdown(&key),
                    spec,
                }
            })
            .collect())
    }

    /// Advisor recommendation clamped to the configured cap
    pub fn max_parallel(&self) -> usize {
        let advised =
            ConcurrencyAdvisor::new(&self.db, self.options.resources).recommended_parallelism();
        self.options
            .max_parallel
            .map_or(advised, |cap| advised.min(cap))
            .max(1)
    }

    pub async fn run(&self) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut stop = self.stop.subscribe();

        info!("Discovering specs under {}", self.options.spec_root.display());
        let mut queue: VecDeque<SpecDescriptor> = self.discover()?.into();
        info!("Found {} spec files", queue.len());

        let max_parallel = self.max_parallel();
        info!("Running specs with {} parallel processes", max_parallel);

        let gate = CacheGate::new(&self.db);
        let mut running = FuturesUnordered::new();
        let mut outcomes = BTreeMap::new();
        let mut executed = Vec::new();
        let mut stopped = false;
        let mut failure = None;

        loop {
            if *stop.borrow() {
                warn!("Stop requested, killing {} running specs", running.len());
                stopped = true;
                break;
            }

            while running.len() < max_parallel {
                let Some(spec) = queue.pop_front() else {
                    break;
                };
                let key = spec.key();
                let decision = gate.decide(&key, &spec.dependency_hash);
                if !decision.should_run() {
                    info!("Skipping {} ({})", key, decision);
                    outcomes.insert(key, SpecOutcome::Skipped);
                    continue;
                }

                debug!("Launching {} ({})", spec, decision);
                self.active.lock().insert(key, Utc::now());
                running.push(self.execute(spec));
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                Some((spec, result)) = running.next() => {
                    let key = spec.key();
                    self.active.lock().remove(&key);
                    let recorded = self
                        .db
                        .record_outcome(&key, &spec.dependency_hash, result.clone());
                    if let Err(e) = recorded {
                        warn!("Could not record {}, ending run: {}", key, e);
                        failure = Some(e);
                        break;
                    }

                    let outcome = if result.status == TestStatus::Passed {
                        SpecOutcome::Passed
                    } else {
                        SpecOutcome::Failed
                    };
                    info!("{}", result);
                    outcomes.insert(key, outcome);
                    executed.push(result);
                }
                _ = stop.changed() => {}
            }
        }

        // Dropping in-flight futures kills their processes.
        drop(running);
        for (spec, _) in std::mem::take(&mut *self.active.lock()) {
            outcomes.insert(spec, SpecOutcome::Aborted);
        }
        if let Some(e) = failure {
            return Err(e.into());
        }

        let report = RunReport {
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            max_parallel,
            outcomes,
            executed,
            not_started: queue.into_iter().map(|s| s.key()).collect(),
            stopped,
        };

        info!(
            "Run finished in {}ms: {} passed, {} failed, {} skipped, {} aborted",
            report.duration_ms,
            report.count(SpecOutcome::Passed),
            report.count(SpecOutcome::Failed),
            report.count(SpecOutcome::Skipped),
            report.count(SpecOutcome::Aborted),
        );
        Ok(report)
    }

    /// Run one spec and turn its exit into a result; never fails
    async fn execute(&self, spec: SpecDescriptor) -> (SpecDescriptor, TestResult) {
        let key = spec.key();
        let started = Instant::now();

        let launched = self.launcher.run(&spec.path);
        let exit = match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, launched).await.ok(),
            None => Some(launched.await),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match exit {
            Some(Ok(exit)) => {
                let status = TestStatus::from_exit_code(exit.exit_code);
                let result = TestResult::new(key.clone(), status, duration_ms);
                let result = if status == TestStatus::Failed {
                    result.with_error(exit.output)
                } else {
                    result
                };
                result.with_performance(PerformanceSample {
                    load_time_ms: duration_ms,
                    cpu_usage: PerformanceSample::cpu_load(exit.usage.cpu_seconds, duration_ms),
                    memory_usage_bytes: i64::try_from(exit.usage.peak_memory_bytes)
                        .unwrap_or(i64::MAX),
                })
            }
            Some(Err(e)) => {
                warn!("Could not run {}: {}", key, e);
                TestResult::failed(key.clone(), duration_ms, e.to_string())
            }
            None => {
                warn!("{} timed out after {}ms, killed", key, duration_ms);
                TestResult::failed(
                    key.clone(),
                    duration_ms,
                    format!("Timed out after {}s", duration_ms / 1000),
                )
            }
        };

        (
            spec,
            result.with_revision(&self.options.branch, &self.options.commit),
        )
    }
}
