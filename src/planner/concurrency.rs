//! Parallelism advice from host resources and historical footprints

use serde::Serialize;
use sysinfo::System;

use crate::store::{stats, StatsDb};

/// Headroom applied to the mean memory footprint
pub const MEMORY_SAFETY_FACTOR: f64 = 1.5;

/// Host capacity the advisor divides up
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SystemResources {
    pub cpu_count: usize,
    pub total_memory_bytes: u64,
}

impl SystemResources {
    /// Probe the current host
    pub fn detect() -> Self {
        let sys = System::new_all();
        let cpu_count = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };
        Self {
            cpu_count,
            total_memory_bytes: sys.total_memory(),
        }
    }
}

/// Breakdown of one recommendation
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ParallelismAdvice {
    pub cpu_count: usize,
    pub memory_bound: Option<usize>,
    pub cpu_bound: Option<usize>,
    pub recommended: usize,
}

pub struct ConcurrencyAdvisor<'a> {
    db: &'a StatsDb,
    resources: SystemResources,
}

impl<'a> ConcurrencyAdvisor<'a> {
    pub fn new(db: &'a StatsDb, resources: SystemResources) -> Self {
        Self { db, resources }
    }

    pub fn recommended_parallelism(&self) -> usize {
        self.advise().recommended
    }

    /// `min(cpus, memory bound, cpu bound)`, never below one.
    ///
    /// The CPU bound is `floor(cpus / mean cpuUsage)`. A bound whose historical
    /// mean is not positive (nothing measured, or heap deltas that net out
    /// negative) imposes no limit.
    pub fn advise(&self) -> ParallelismAdvice {
        let cpu_count = self.resources.cpu_count.max(1);

        let (mean_memory, mean_load) = self.db.read(|data| {
            let results = &data.history.results;
            (
                stats::mean(results.iter().map(|r| r.performance.memory_usage_bytes as f64)),
                stats::mean(results.iter().map(|r| r.performance.cpu_usage)),
            )
        });

        let memory_bound = mean_memory.filter(|m| *m > 0.0).map(|m| {
            (self.resources.total_memory_bytes as f64 / (m * MEMORY_SAFETY_FACTOR)).floor() as usize
        });
        let cpu_bound = mean_load
            .filter(|l| *l > 0.0)
            .map(|l| (cpu_count as f64 / l).floor() as usize);

        let recommended = [Some(cpu_count), memory_bound, cpu_bound]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(cpu_count)
            .max(1);

        ParallelismAdvice {
            cpu_count,
            memory_bound,
            cpu_bound,
            recommended,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PerformanceSample, TestResult};
    use crate::store::StoreData;

    const GIB: i64 = 1024 * 1024 * 1024;

    fn resources(cpu_count: usize, memory_gib: u64) -> SystemResources {
        SystemResources {
            cpu_count,
            total_memory_bytes: memory_gib * GIB as u64,
        }
    }

    fn db_with(samples: &[(u64, f64, i64)]) -> StatsDb {
        let mut data = StoreData::default();
        for (i, (duration, cpu, memory)) in samples.iter().enumerate() {
            let spec = format!("s{i}.cy.ts");
            let result = TestResult::passed(spec.clone(), *duration).with_performance(
                PerformanceSample {
                    load_time_ms: *duration,
                    cpu_usage: *cpu,
                    memory_usage_bytes: *memory,
                },
            );
            data.record(&spec, "h", result);
        }
        StatsDb::from_data(data)
    }

    #[test]
    fn test_no_history_uses_cpu_count() {
        let db = StatsDb::in_memory();
        assert_eq!(
            ConcurrencyAdvisor::new(&db, resources(12, 32)).recommended_parallelism(),
            12
        );
    }

    #[test]
    fn test_memory_bound_limits() {
        // 4 GiB mean * 1.5 = 6 GiB per spec; 16 GiB host -> 2
        let db = db_with(&[(1000, 0.5, 4 * GIB), (1000, 0.5, 4 * GIB)]);
        let advice = ConcurrencyAdvisor::new(&db, resources(8, 16)).advise();
        assert_eq!(advice.memory_bound, Some(2));
        assert_eq!(advice.recommended, 2);
    }

    #[test]
    fn test_cpu_bound_limits() {
        // each spec keeps two cores busy: 8 / 2 = 4
        let db = db_with(&[(1000, 2.0, GIB / 10)]);
        let advice = ConcurrencyAdvisor::new(&db, resources(8, 64)).advise();
        assert_eq!(advice.cpu_bound, Some(4));
        assert_eq!(advice.recommended, 4);
    }

    #[test]
    fn test_cpu_bound_uses_mean_cpu_usage() {
        // two busy cores over a 4 s run on a 4 core host -> 2
        let db = db_with(&[(4000, 2.0, 0)]);
        let advice = ConcurrencyAdvisor::new(&db, resources(4, 64)).advise();
        assert_eq!(advice.cpu_bound, Some(2));
        assert_eq!(advice.recommended, 2);
    }

    #[test]
    fn test_negative_memory_mean_imposes_no_bound() {
        let db = db_with(&[(1000, 0.0, -524_288), (1000, 0.0, 262_144)]);
        let advice = ConcurrencyAdvisor::new(&db, resources(4, 8)).advise();
        assert_eq!(advice.memory_bound, None);
        assert_eq!(advice.recommended, 4);
    }

    #[test]
    fn test_never_exceeds_any_bound() {
        let db = db_with(&[(2000, 0.2, GIB / 4), (500, 0.1, GIB / 2), (800, 1.6, GIB)]);
        for cpus in [1, 2, 4, 8, 64] {
            let advice = ConcurrencyAdvisor::new(&db, resources(cpus, 8)).advise();
            assert!(advice.recommended <= cpus);
            assert!(advice.recommended <= advice.memory_bound.unwrap().max(1));
            assert!(advice.recommended <= advice.cpu_bound.unwrap().max(1));
        }
    }

    #[test]
    fn test_unmeasured_history_imposes_no_bound() {
        let db = db_with(&[(1000, 0.0, 0)]);
        let advice = ConcurrencyAdvisor::new(&db, resources(6, 8)).advise();
        assert_eq!(advice.memory_bound, None);
        assert_eq!(advice.cpu_bound, None);
        assert_eq!(advice.recommended, 6);
    }

    #[test]
    fn test_never_below_one() {
        let db = db_with(&[(1000, 1.0, 64 * GIB)]);
        assert_eq!(
            ConcurrencyAdvisor::new(&db, resources(4, 8)).recommended_parallelism(),
            1
        );
    }
}
