//! Online statistics over spec run history
//!
//! Moving averages, nearest-rank percentiles, failure rates and flakiness.

use crate::models::{TestResult, TestStatus};

/// Smoothing factor for the duration moving average
pub const EMA_ALPHA: f64 = 0.1;

/// Number of most recent results considered for a spec's failure rate
pub const FAILURE_WINDOW: usize = 100;

/// Exponential moving average step
pub fn ema(previous: f64, sample: f64, alpha: f64) -> f64 {
    alpha * sample + (1.0 - alpha) * previous
}

/// 95th percentile using index `floor(n * 0.95)` of the ascending series
pub fn p95(durations: &[u64]) -> Option<u64> {
    let mut sorted = durations.to_vec();
    sorted.sort_unstable();
    let idx = (sorted.len() as f64 * 0.95).floor() as usize;
    sorted.get(idx).copied()
}

/// Fraction of failed results among `results`
pub fn failure_rate<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> f64 {
    let (failed, total) = results.into_iter().fold((0usize, 0usize), |(f, t), r| {
        (f + usize::from(r.status == TestStatus::Failed), t + 1)
    });
    if total == 0 {
        0.0
    } else {
        failed as f64 / total as f64
    }
}

/// Fraction of adjacent pairs whose status differs; 0 for fewer than two runs
pub fn flakiness(statuses: &[TestStatus]) -> f64 {
    if statuses.len() < 2 {
        return 0.0;
    }
    let changes = statuses.windows(2).filter(|w| w[0] != w[1]).count();
    changes as f64 / (statuses.len() - 1) as f64
}

/// Arithmetic mean, `None` for an empty series
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flakiness_alternating() {
        use TestStatus::*;
        assert_eq!(flakiness(&[Passed, Failed, Passed, Failed]), 1.0);
        assert_eq!(flakiness(&[Passed, Passed, Passed]), 0.0);
        assert_eq!(flakiness(&[Failed]), 0.0);
        assert!((flakiness(&[Passed, Passed, Failed]) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_p95_index() {
        assert_eq!(p95(&[]), None);
        assert_eq!(p95(&[500]), Some(500));

        // floor(20 * 0.95) = 19 -> largest element
        let series: Vec<u64> = (1..=20).rev().collect();
        assert_eq!(p95(&series), Some(20));

        // floor(10 * 0.95) = 9
        let series: Vec<u64> = (1..=10).map(|x| x * 10).collect();
        assert_eq!(p95(&series), Some(100));
    }

    #[test]
    fn test_ema_converges_on_repeated_samples() {
        let mut avg = 1000.0;
        for _ in 0..200 {
            avg = ema(avg, 200.0, EMA_ALPHA);
        }
        assert!((avg - 200.0).abs() < 0.01);
        assert_eq!(ema(300.0, 300.0, EMA_ALPHA), 300.0);
    }

    #[test]
    fn test_failure_rate() {
        let results = vec![
            TestResult::passed("a.cy.ts", 1),
            TestResult::failed("a.cy.ts", 1, "x"),
            TestResult::failed("a.cy.ts", 1, "x"),
            TestResult::passed("a.cy.ts", 1),
        ];
        assert_eq!(failure_rate(&results), 0.5);
        assert_eq!(failure_rate(&[]), 0.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean([1.0, 2.0, 3.0]), Some(2.0));
    }
}
