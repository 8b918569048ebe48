//! History-based spec priority

use serde::Serialize;

use crate::store::{stats, StatsDb, StoreData};

/// Priority of a spec that has never run
pub const DEFAULT_PRIORITY: f64 = 1.0;

/// Number of most recent runs used for the recent-failure factor
pub const RECENT_WINDOW: usize = 5;

const WEIGHT_RECENT_FAILURES: f64 = 0.4;
const WEIGHT_DURATION: f64 = 0.2;
const WEIGHT_FLAKINESS: f64 = 0.3;
const WEIGHT_FREQUENCY: f64 = 0.1;

/// The four weighted inputs of a priority score
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PriorityFactors {
    pub recent_failure_rate: f64,
    pub normalized_duration: f64,
    pub flakiness: f64,
    pub frequency: f64,
}

impl PriorityFactors {
    pub fn score(&self) -> f64 {
        WEIGHT_RECENT_FAILURES * self.recent_failure_rate
            + WEIGHT_DURATION * self.normalized_duration
            + WEIGHT_FLAKINESS * self.flakiness
            + WEIGHT_FREQUENCY * self.frequency
    }

    /// Factors for `spec`, or `None` when it has no history
    pub fn from_history(data: &StoreData, spec: &str) -> Option<Self> {
        let history = &data.history;
        let results: Vec<_> = history.spec_results(spec).collect();
        if results.is_empty() {
            return None;
        }

        let recent = &results[results.len().saturating_sub(RECENT_WINDOW)..];
        let recent_failure_rate = stats::failure_rate(recent.iter().copied());

        let mean_duration =
            stats::mean(results.iter().map(|r| r.duration_ms as f64)).unwrap_or(0.0);
        let max_duration = history.max_duration_ms();
        let normalized_duration = if max_duration == 0 {
            0.0
        } else {
            mean_duration / max_duration as f64
        };

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        let flakiness = stats::flakiness(&statuses);

        let frequency = results.len() as f64 / history.results.len() as f64
            * history.specs().len() as f64;

        Some(Self {
            recent_failure_rate,
            normalized_duration,
            flakiness,
            frequency,
        })
    }
}

/// Scores specs so recently failing, flaky and slow specs start first
pub struct PriorityScorer<'a> {
    db: &'a StatsDb,
}

impl<'a> PriorityScorer<'a> {
    pub fn new(db: &'a StatsDb) -> Self {
        Self { db }
    }

    pub fn compute_priority(&self, spec: &str) -> f64 {
        self.score_breakdown(spec)
            .map(|factors| factors.score())
            .unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn score_breakdown(&self, spec: &str) -> Option<PriorityFactors> {
        self.db.read(|data| PriorityFactors::from_history(data, spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestResult, TestStatus};

    fn db_with(runs: &[(&str, TestStatus, u64)]) -> StatsDb {
        let mut data = StoreData::default();
        for (spec, status, duration) in runs {
            data.record(spec, "h", TestResult::new(*spec, *status, *duration));
        }
        StatsDb::from_data(data)
    }

    #[test]
    fn test_unknown_spec_gets_default_priority() {
        let db = StatsDb::in_memory();
        assert_eq!(PriorityScorer::new(&db).compute_priority("new.cy.ts"), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_failing_spec_outranks_passing_twin() {
        use TestStatus::*;
        let mut runs = Vec::new();
        for _ in 0..5 {
            runs.push(("failing.cy.ts", Failed, 1000));
            runs.push(("passing.cy.ts", Passed, 1000));
        }
        let db = db_with(&runs);
        let scorer = PriorityScorer::new(&db);

        assert!(scorer.compute_priority("failing.cy.ts") > scorer.compute_priority("passing.cy.ts"));
    }

    #[test]
    fn test_factor_values() {
        use TestStatus::*;
        let db = db_with(&[
            ("a", Passed, 100),
            ("a", Failed, 300),
            ("b", Passed, 600),
            ("a", Passed, 200),
        ]);

        let factors = PriorityScorer::new(&db).score_breakdown("a").unwrap();
        assert!((factors.recent_failure_rate - 1.0 / 3.0).abs() < 1e-9);
        // mean 200 / max 600
        assert!((factors.normalized_duration - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(factors.flakiness, 1.0);
        // 3 of 4 runs, 2 distinct specs
        assert!((factors.frequency - 1.5).abs() < 1e-9);

        let expected = 0.4 / 3.0 + 0.2 / 3.0 + 0.3 + 0.15;
        assert!((PriorityScorer::new(&db).compute_priority("a") - expected).abs() < 1e-9);
    }

    #[test]
    fn test_recent_window_ignores_old_failures() {
        use TestStatus::*;
        let mut runs = vec![("a", Failed, 10); 3];
        runs.extend(vec![("a", Passed, 10); RECENT_WINDOW]);
        let db = db_with(&runs);

        let factors = PriorityScorer::new(&db).score_breakdown("a").unwrap();
        assert_eq!(factors.recent_failure_rate, 0.0);
    }
}
