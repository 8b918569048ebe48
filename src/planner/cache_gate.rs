//! Skip decisions for unchanged, stable specs

use serde::Serialize;
use std::fmt;

use crate::store::StatsDb;

/// Baseline failure rate below which a spec counts as stable
pub const STABLE_FAILURE_RATE: f64 = 0.01;

/// Why a spec will or will not run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    NeverRun,
    ContentChanged,
    NoBaseline,
    Unstable,
    SlowerThanP95,
    Cached,
}

impl GateDecision {
    pub fn should_run(&self) -> bool {
        !matches!(self, GateDecision::Cached)
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            GateDecision::NeverRun => "never run",
            GateDecision::ContentChanged => "content changed",
            GateDecision::NoBaseline => "no baseline",
            GateDecision::Unstable => "unstable",
            GateDecision::SlowerThanP95 => "last run slower than p95",
            GateDecision::Cached => "cached",
        };
        f.write_str(reason)
    }
}

pub struct CacheGate<'a> {
    db: &'a StatsDb,
}

impl<'a> CacheGate<'a> {
    pub fn new(db: &'a StatsDb) -> Self {
        Self { db }
    }

    pub fn should_run(&self, spec: &str, hash: &str) -> bool {
        self.decide(spec, hash).should_run()
    }

    pub fn decide(&self, spec: &str, hash: &str) -> GateDecision {
        self.db.read(|data| {
            let Some(entry) = data.cache.last_run.get(spec) else {
                return GateDecision::NeverRun;
            };
            if entry.hash != hash {
                return GateDecision::ContentChanged;
            }
            let Some(baseline) = data.cache.performance_baseline.get(spec) else {
                return GateDecision::NoBaseline;
            };
            if baseline.failure_rate >= STABLE_FAILURE_RATE {
                return GateDecision::Unstable;
            }
            if entry.result.duration_ms > baseline.p95_duration_ms {
                return GateDecision::SlowerThanP95;
            }
            GateDecision::Cached
        })
    }
}
