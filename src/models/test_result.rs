//! Test result models for spec execution
//!
//! Defines run statuses, per-run resource samples and the immutable result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Spec execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Pending,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Pending => "…",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }

    /// Status derived from a process exit code
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => TestStatus::Passed,
            _ => TestStatus::Failed,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASSED"),
            TestStatus::Failed => write!(f, "FAILED"),
            TestStatus::Pending => write!(f, "PENDING"),
        }
    }
}

/// Resource footprint of one spec run
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    #[serde(rename = "loadTime")]
    pub load_time_ms: u64,

    /// Average busy cores while the spec ran (CPU seconds per wall second)
    #[serde(rename = "cpuUsage")]
    pub cpu_usage: f64,

    /// Peak resident memory of the spec process. Older histories carry
    /// heap deltas here, which can be negative.
    #[serde(rename = "memoryUsage")]
    pub memory_usage_bytes: i64,
}

impl PerformanceSample {
    /// Busy cores from CPU seconds spent over `wall_ms` of wall-clock time
    pub fn cpu_load(cpu_seconds: f64, wall_ms: u64) -> f64 {
        if wall_ms == 0 {
            return 0.0;
        }
        cpu_seconds / (wall_ms as f64 / 1000.0)
    }
}

/// Result of a single spec execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub suite: String,
    pub spec: String,
    pub status: TestStatus,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub branch: String,
    pub commit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<Vec<String>>,
    pub performance: PerformanceSample,
}

impl TestResult {
    /// New result for `spec` stamped now, with a fresh id
    pub fn new(spec: impl Into<String>, status: TestStatus, duration_ms: u64) -> Self {
        let spec = spec.into();
        Self {
            id: Uuid::new_v4().to_string(),
            suite: suite_of(&spec),
            spec,
            status,
            duration_ms,
            error: None,
            timestamp: Utc::now(),
            branch: "master".to_string(),
            commit: "HEAD".to_string(),
            screenshots: None,
            performance: PerformanceSample {
                load_time_ms: duration_ms,
                ..Default::default()
            },
        }
    }

    pub fn passed(spec: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(spec, TestStatus::Passed, duration_ms)
    }

    pub fn failed(spec: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self::new(spec, TestStatus::Failed, duration_ms).with_error(error)
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_performance(mut self, performance: PerformanceSample) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_revision(mut self, branch: impl Into<String>, commit: impl Into<String>) -> Self {
        self.branch = branch.into();
        self.commit = commit.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.spec,
            self.duration_ms
        )?;
        if let Some(error) = &self.error {
            if let Some(first_line) = error.lines().find(|l| !l.trim().is_empty()) {
                write!(f, " - {}", first_line.trim())?;
            }
        }
        Ok(())
    }
}

/// Suite name of a spec: the name of its containing directory
pub fn suite_of(spec: &str) -> String {
    Path::new(spec)
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_exit_code() {
        assert_eq!(TestStatus::from_exit_code(Some(0)), TestStatus::Passed);
        assert_eq!(TestStatus::from_exit_code(Some(2)), TestStatus::Failed);
        assert_eq!(TestStatus::from_exit_code(None), TestStatus::Failed);
    }

    #[test]
    fn test_suite_is_parent_directory() {
        let result = TestResult::passed("cypress/e2e/admin/login.cy.ts", 100);
        assert_eq!(result.suite, "admin");
        assert_eq!(suite_of("login.cy.ts"), "");
    }

    #[test]
    fn test_result_uses_camel_case_field_names() {
        let result = TestResult::failed("e2e/cart.cy.ts", 1200, "boom");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["duration"], 1200);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["performance"]["loadTime"], 1200);
        assert!(json.get("screenshots").is_none());
    }

    #[test]
    fn test_cpu_load() {
        assert!((PerformanceSample::cpu_load(1.0, 2000) - 0.5).abs() < f64::EPSILON);
        assert_eq!(PerformanceSample::cpu_load(3.0, 0), 0.0);
    }

    #[test]
    fn test_negative_memory_usage_survives_round_trip() {
        let raw = r#"{
            "id": "abc123",
            "suite": "e2e",
            "spec": "cypress/e2e/cart.cy.ts",
            "status": "passed",
            "duration": 4000,
            "timestamp": "2024-03-01T10:00:00.000Z",
            "branch": "main",
            "commit": "deadbeef",
            "performance": {"loadTime": 4000, "cpuUsage": 0.3, "memoryUsage": -524288}
        }"#;
        let result: TestResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.performance.memory_usage_bytes, -524288);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["performance"]["memoryUsage"], -524288);
        let back: TestResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_display_shows_first_error_line() {
        let result = TestResult::failed("a.cy.ts", 5, "\n  AssertionError: nope\nstack");
        assert_eq!(result.to_string(), "✗ a.cy.ts [5ms] - AssertionError: nope");
    }
}
