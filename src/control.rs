//! Run control handle
//!
//! Starts orchestration runs in the background, stops them, and answers
//! queries about live and historical results.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::executor::{Orchestrator, RunError, RunReport};
use crate::models::TestResult;
use crate::store::{StatsDb, SuiteSummary, TrendPoint};

pub struct RunController {
    orchestrator: Arc<Orchestrator>,
    current: Mutex<Option<JoinHandle<Result<RunReport, RunError>>>>,
}

impl RunController {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            current: Mutex::new(None),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn db(&self) -> &StatsDb {
        self.orchestrator.db()
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Begin a run in the background.
    ///
    /// A trend point is appended to the store once the run finishes.
    pub fn start_run(&self) -> Result<(), RunError> {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(RunError::AlreadyRunning);
        }

        self.orchestrator.reset_stop();
        let orchestrator = self.orchestrator.clone();
        *current = Some(tokio::spawn(async move {
            let report = orchestrator.run().await?;
            orchestrator.db().add_trend_point(report.trend_point())?;
            Ok(report)
        }));
        info!("Run started");
        Ok(())
    }

    /// Request the active run to stop; no-op when idle
    pub fn stop_run(&self) {
        if self.is_running() {
            info!("Stopping run");
        }
        self.orchestrator.stop();
    }

    /// Wait for the most recently started run; `None` if none was started
    pub async fn wait(&self) -> Result<Option<RunReport>, RunError> {
        let handle = self.current.lock().take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| RunError::Task(e.to_string()))?
                .map(Some),
            None => Ok(None),
        }
    }

    /// Start a run and wait for its report
    pub async fn run_to_completion(&self) -> Result<RunReport, RunError> {
        self.start_run()?;
        self.wait()
            .await?
            .ok_or_else(|| RunError::Task("run handle disappeared".to_string()))
    }

    pub fn active_tests(&self) -> Vec<TestResult> {
        self.orchestrator.active_tests()
    }

    pub fn recent_results(&self, limit: usize) -> Vec<TestResult> {
        self.db().recent_results(limit)
    }

    pub fn test_suites(&self) -> Vec<SuiteSummary> {
        self.db().test_suites()
    }

    pub fn performance_trends(&self) -> Vec<TrendPoint> {
        self.db().performance_trends()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{LaunchError, RunOptions, SpecExit, SpecLauncher};
    use crate::hashing::DependencyHasher;
    use crate::planner::SystemResources;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    struct SleepLauncher(Duration);

    #[async_trait]
    impl SpecLauncher for SleepLauncher {
        async fn run(&self, _spec: &Path) -> Result<SpecExit, LaunchError> {
            tokio::time::sleep(self.0).await;
            Ok(SpecExit {
                exit_code: Some(0),
                ..Default::default()
            })
        }
    }

    fn controller(dir: &TempDir, delay_ms: u64) -> RunController {
        for name in ["admin/login.cy.ts", "admin/users.cy.ts", "shop/cart.cy.ts"] {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, name).unwrap();
        }
        let resources = SystemResources {
            cpu_count: 2,
            total_memory_bytes: 4 * 1024 * 1024 * 1024,
        };
        RunController::new(Orchestrator::new(
            Arc::new(StatsDb::in_memory()),
            DependencyHasher::default(),
            Arc::new(SleepLauncher(Duration::from_millis(delay_ms))),
            RunOptions::new(dir.path(), resources),
        ))
    }

    #[tokio::test]
    async fn test_run_records_trend_and_history() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, 0);

        let report = controller.run_to_completion().await.unwrap();
        assert_eq!(report.results().len(), 3);
        assert!(!controller.is_running());

        let trends = controller.performance_trends();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].parallelism, 2);
        assert!((trends[0].pass_rate - 1.0).abs() < 1e-9);

        assert_eq!(controller.recent_results(2).len(), 2);
        let suites: Vec<_> = controller
            .test_suites()
            .into_iter()
            .map(|s| (s.name, s.total_runs))
            .collect();
        assert_eq!(
            suites,
            vec![("admin".to_string(), 2), ("shop".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, 200);

        controller.start_run().unwrap();
        assert!(controller.is_running());
        assert!(matches!(
            controller.start_run(),
            Err(RunError::AlreadyRunning)
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!controller.active_tests().is_empty());

        controller.stop_run();
        let report = controller.wait().await.unwrap().unwrap();
        assert!(report.stopped);
        assert!(controller.recent_results(10).is_empty());

        // A stopped controller can be started again.
        let report = controller.run_to_completion().await.unwrap();
        assert!(!report.stopped);
        assert_eq!(controller.performance_trends().len(), 2);
    }

    #[test]
    fn test_idle_controller() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, 0);

        assert!(!controller.is_running());
        assert!(controller.active_tests().is_empty());
        assert!(controller.performance_trends().is_empty());
        assert!(tokio_test::block_on(controller.wait()).unwrap().is_none());
    }
}
