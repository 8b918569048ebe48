//! Persisted store layout
//!
//! One self-contained document holding the cache, the run history and the
//! performance trend series. Field names follow the camelCase JSON layout the
//! store file has always used.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::stats::{self, EMA_ALPHA, FAILURE_WINDOW};
use crate::models::{TestResult, TestStatus};

/// Root document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub cache: TestCache,
    #[serde(default)]
    pub history: History,
    #[serde(default)]
    pub performance: Performance,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCache {
    /// Last result per spec, keyed by spec path
    #[serde(default)]
    pub last_run: BTreeMap<String, CacheEntry>,
    #[serde(default)]
    pub performance_baseline: BTreeMap<String, PerformanceBaseline>,
}

/// Last run of a spec together with the content hash it ran against
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub result: TestResult,
}

/// Rolling expectation for one spec
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceBaseline {
    #[serde(rename = "avgDuration")]
    pub avg_duration_ms: f64,
    #[serde(rename = "p95Duration")]
    pub p95_duration_ms: u64,
    pub failure_rate: f64,
}

impl PerformanceBaseline {
    /// Baseline seeded from a spec's first result
    pub fn seed(result: &TestResult) -> Self {
        Self {
            avg_duration_ms: result.duration_ms as f64,
            p95_duration_ms: result.duration_ms,
            failure_rate: if result.status == TestStatus::Failed {
                1.0
            } else {
                0.0
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub results: Vec<TestResult>,
    #[serde(default)]
    pub stats: HistoryStats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_runs: usize,
    pub pass_rate: f64,
    #[serde(rename = "avgDuration")]
    pub avg_duration_ms: f64,
    pub flakiness: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default)]
    pub trends: Vec<TrendPoint>,
}

/// One snapshot of suite-wide performance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    #[serde(rename = "avgDuration")]
    pub avg_duration_ms: f64,
    pub pass_rate: f64,
    pub parallelism: usize,
}

/// Aggregate view of one suite (spec directory)
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSummary {
    pub name: String,
    pub total_runs: usize,
    pub pass_rate: f64,
    pub avg_duration_ms: f64,
    pub flakiness: f64,
    pub last_run: Option<DateTime<Utc>>,
}

impl History {
    /// Results for one spec in chronological order
    pub fn spec_results<'a>(&'a self, spec: &'a str) -> impl Iterator<Item = &'a TestResult> + 'a {
        self.results.iter().filter(move |r| r.spec == spec)
    }

    pub fn spec_statuses(&self, spec: &str) -> Vec<TestStatus> {
        self.spec_results(spec).map(|r| r.status).collect()
    }

    pub fn spec_flakiness(&self, spec: &str) -> f64 {
        stats::flakiness(&self.spec_statuses(spec))
    }

    /// Distinct spec paths in first-seen order
    pub fn specs(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.results
            .iter()
            .filter(|r| seen.insert(r.spec.as_str()))
            .map(|r| r.spec.as_str())
            .collect()
    }

    pub fn max_duration_ms(&self) -> u64 {
        self.results.iter().map(|r| r.duration_ms).max().unwrap_or(0)
    }

    /// Recompute the aggregate stats block from the result list
    pub fn recompute_stats(&mut self) {
        let total = self.results.len();
        if total == 0 {
            self.stats = HistoryStats::default();
            return;
        }

        let passed = self
            .results
            .iter()
            .filter(|r| r.status == TestStatus::Passed)
            .count();
        let specs = self.specs();
        let flakiness =
            stats::mean(specs.iter().map(|s| self.spec_flakiness(s))).unwrap_or(0.0);

        self.stats = HistoryStats {
            total_runs: total,
            pass_rate: passed as f64 / total as f64,
            avg_duration_ms: stats::mean(self.results.iter().map(|r| r.duration_ms as f64))
                .unwrap_or(0.0),
            flakiness,
        };
    }

    /// Most recent results first
    pub fn recent(&self, limit: usize) -> Vec<TestResult> {
        self.results.iter().rev().take(limit).cloned().collect()
    }

    /// Per-suite aggregates, sorted by suite name
    pub fn suites(&self) -> Vec<SuiteSummary> {
        let mut by_suite: BTreeMap<&str, Vec<&TestResult>> = BTreeMap::new();
        for result in &self.results {
            by_suite.entry(result.suite.as_str()).or_default().push(result);
        }

        by_suite
            .into_iter()
            .map(|(name, results)| {
                let specs: BTreeSet<&str> = results.iter().map(|r| r.spec.as_str()).collect();
                let passed = results
                    .iter()
                    .filter(|r| r.status == TestStatus::Passed)
                    .count();
                SuiteSummary {
                    name: name.to_string(),
                    total_runs: results.len(),
                    pass_rate: passed as f64 / results.len() as f64,
                    avg_duration_ms: stats::mean(results.iter().map(|r| r.duration_ms as f64))
                        .unwrap_or(0.0),
                    flakiness: stats::mean(specs.iter().map(|s| self.spec_flakiness(s)))
                        .unwrap_or(0.0),
                    last_run: results.iter().map(|r| r.timestamp).max(),
                }
            })
            .collect()
    }
}

impl StoreData {
    /// Fold a freshly appended result into the spec's baseline.
    ///
    /// Must run after the result has been pushed onto the history so the
    /// percentile and failure window include it.
    pub fn update_baseline(&mut self, spec: &str, result: &TestResult) {
        let mut baseline = self
            .cache
            .performance_baseline
            .get(spec)
            .copied()
            .unwrap_or_else(|| PerformanceBaseline::seed(result));

        baseline.avg_duration_ms =
            stats::ema(baseline.avg_duration_ms, result.duration_ms as f64, EMA_ALPHA);

        let durations: Vec<u64> = self
            .history
            .spec_results(spec)
            .map(|r| r.duration_ms)
            .collect();
        baseline.p95_duration_ms = stats::p95(&durations).unwrap_or(result.duration_ms);

        let spec_results: Vec<&TestResult> = self.history.spec_results(spec).collect();
        let window_start = spec_results.len().saturating_sub(FAILURE_WINDOW);
        baseline.failure_rate = stats::failure_rate(spec_results[window_start..].iter().copied());

        self.cache
            .performance_baseline
            .insert(spec.to_string(), baseline);
    }

    /// Append, cache and re-baseline in one step
    pub fn record(&mut self, spec: &str, hash: &str, result: TestResult) {
        self.history.results.push(result.clone());
        self.history.recompute_stats();
        self.update_baseline(spec, &result);
        self.cache.last_run.insert(
            spec.to_string(),
            CacheEntry {
                hash: hash.to_string(),
                result,
            },
        );
    }

    /// Recompute every baseline and the stats block from the history.
    ///
    /// Cache hashes cannot be derived from history, so existing cache entries
    /// keep their hash and only have their result refreshed to the spec's
    /// latest run.
    pub fn rebuild_derived(&mut self) {
        let results = std::mem::take(&mut self.history.results);
        self.cache.performance_baseline.clear();

        for result in results {
            let spec = result.spec.clone();
            self.history.results.push(result.clone());
            self.update_baseline(&spec, &result);
            if let Some(entry) = self.cache.last_run.get_mut(&spec) {
                entry.result = result;
            }
        }
        self.history.recompute_stats();
    }
}
