//! Shared statistics handle
//!
//! `StatsDb` owns the in-memory document behind a single mutex. Every
//! mutation is a read-modify-write under that lock, written through to the
//! backend before it becomes visible, so parallel completions cannot lose each
//! other's updates and a failed write changes nothing.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use super::backend::{MemoryStore, StatisticsStore};
use super::data::{
    CacheEntry, HistoryStats, PerformanceBaseline, StoreData, SuiteSummary, TrendPoint,
};
use super::StoreError;
use crate::models::TestResult;

pub struct StatsDb {
    backend: Arc<dyn StatisticsStore>,
    data: Mutex<StoreData>,
}

impl StatsDb {
    /// Open a handle, loading the current document from `backend`
    pub fn open(backend: Arc<dyn StatisticsStore>) -> Result<Self, StoreError> {
        let data = backend.read()?;
        debug!(
            "Opened statistics store with {} results",
            data.history.results.len()
        );
        Ok(Self {
            backend,
            data: Mutex::new(data),
        })
    }

    /// Fresh volatile store
    pub fn in_memory() -> Self {
        Self::from_data(StoreData::default())
    }

    /// Volatile store pre-populated with `data`
    pub fn from_data(data: StoreData) -> Self {
        Self {
            backend: Arc::new(MemoryStore::with_data(data.clone())),
            data: Mutex::new(data),
        }
    }

    /// Run `f` against a consistent view of the document
    pub fn read<R>(&self, f: impl FnOnce(&StoreData) -> R) -> R {
        f(&*self.data.lock())
    }

    /// Mutate a copy under the lock; it replaces the shared document only
    /// once the backend has accepted it
    fn update<R>(&self, f: impl FnOnce(&mut StoreData) -> R) -> Result<R, StoreError> {
        let mut data = self.data.lock();
        let mut next = (*data).clone();
        let out = f(&mut next);
        self.backend.write(&next)?;
        *data = next;
        Ok(out)
    }

    pub fn snapshot(&self) -> StoreData {
        self.read(StoreData::clone)
    }

    pub fn cache_entry(&self, spec: &str) -> Option<CacheEntry> {
        self.read(|d| d.cache.last_run.get(spec).cloned())
    }

    /// Cached result, only when it was produced from content hashing to `hash`
    pub fn cached_result(&self, spec: &str, hash: &str) -> Option<TestResult> {
        self.read(|d| {
            d.cache
                .last_run
                .get(spec)
                .filter(|entry| entry.hash == hash)
                .map(|entry| entry.result.clone())
        })
    }

    pub fn cache_result(
        &self,
        spec: &str,
        hash: &str,
        result: TestResult,
    ) -> Result<(), StoreError> {
        self.update(|d| {
            d.cache.last_run.insert(
                spec.to_string(),
                CacheEntry {
                    hash: hash.to_string(),
                    result,
                },
            );
        })
    }

    pub fn add_result(&self, result: TestResult) -> Result<(), StoreError> {
        self.update(|d| {
            d.history.results.push(result);
            d.history.recompute_stats();
        })
    }

    pub fn update_baseline(&self, spec: &str, result: &TestResult) -> Result<(), StoreError> {
        self.update(|d| d.update_baseline(spec, result))
    }

    /// Append to history, overwrite the cache entry and refresh the baseline
    /// as one atomic, persisted step
    pub fn record_outcome(
        &self,
        spec: &str,
        hash: &str,
        result: TestResult,
    ) -> Result<(), StoreError> {
        self.update(|d| d.record(spec, hash, result))
    }

    pub fn baseline(&self, spec: &str) -> Option<PerformanceBaseline> {
        self.read(|d| d.cache.performance_baseline.get(spec).copied())
    }

    pub fn spec_results(&self, spec: &str) -> Vec<TestResult> {
        self.read(|d| d.history.spec_results(spec).cloned().collect())
    }

    pub fn flakiness(&self, spec: &str) -> f64 {
        self.read(|d| d.history.spec_flakiness(spec))
    }

    pub fn stats(&self) -> HistoryStats {
        self.read(|d| d.history.stats)
    }

    pub fn has_history(&self) -> bool {
        self.read(|d| !d.history.results.is_empty())
    }

    pub fn recent_results(&self, limit: usize) -> Vec<TestResult> {
        self.read(|d| d.history.recent(limit))
    }

    pub fn test_suites(&self) -> Vec<SuiteSummary> {
        self.read(|d| d.history.suites())
    }

    pub fn performance_trends(&self) -> Vec<TrendPoint> {
        self.read(|d| d.performance.trends.clone())
    }

    pub fn add_trend_point(&self, point: TrendPoint) -> Result<(), StoreError> {
        self.update(|d| d.performance.trends.push(point))
    }

    /// Recompute every derived structure from the history list
    pub fn rebuild_derived(&self) -> Result<(), StoreError> {
        self.update(StoreData::rebuild_derived)
    }
}
