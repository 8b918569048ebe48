//! Output formatters for run reports and stored statistics
//!
//! Provides table, JSON, CSV and one-line summary formats.

use serde::Serialize;

use crate::executor::{PlannedSpec, RunReport, SpecOutcome};
use crate::models::{TestResult, TestStatus};
use crate::store::{HistoryStats, SuiteSummary, TrendPoint};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

const LABEL_WIDTH: usize = 12;

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Option<String> {
        match self.format {
            OutputFormat::Json => Some(serde_json::to_string(value).unwrap_or_default()),
            OutputFormat::JsonPretty => {
                Some(serde_json::to_string_pretty(value).unwrap_or_default())
            }
            _ => None,
        }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Status column, padded to `LABEL_WIDTH` before the color codes go on
    fn status_label(&self, status: TestStatus) -> String {
        let label = format!("{:<LABEL_WIDTH$}", format!("{} {}", status.symbol(), status));
        match status {
            TestStatus::Passed => self.paint(&label, "32"),
            TestStatus::Failed => self.paint(&label, "31"),
            TestStatus::Pending => self.paint(&label, "33"),
        }
    }

    fn outcome_label(&self, outcome: SpecOutcome) -> String {
        let (label, color) = match outcome {
            SpecOutcome::Passed => ("✓ PASSED", "32"),
            SpecOutcome::Failed => ("✗ FAILED", "31"),
            SpecOutcome::Skipped => ("○ CACHED", "36"),
            SpecOutcome::Aborted => ("! ABORTED", "33"),
        };
        self.paint(&format!("{label:<LABEL_WIDTH$}"), color)
    }

    /// Format the report of a finished run
    pub fn format_report(&self, report: &RunReport) -> String {
        if let Some(json) = self.json(report) {
            return json;
        }
        match self.format {
            OutputFormat::Csv => csv_table(
                &["spec", "outcome", "passed"],
                report.outcomes.iter().map(|(spec, outcome)| {
                    vec![
                        spec.clone(),
                        outcome.as_str().to_string(),
                        outcome.is_success().to_string(),
                    ]
                }),
            ),
            OutputFormat::Summary => self.report_brief(report),
            _ => self.report_table(report),
        }
    }

    fn report_table(&self, report: &RunReport) -> String {
        let mut output = String::new();
        output.push('\n');
        for (spec, outcome) in &report.outcomes {
            let duration = report
                .executed
                .iter()
                .find(|r| &r.spec == spec)
                .map(|r| format!("{:>8}ms", r.duration_ms))
                .unwrap_or_else(|| format!("{:>10}", "-"));
            output.push_str(&format!(
                "  {} {} {}\n",
                self.outcome_label(*outcome),
                duration,
                spec
            ));
        }
        for spec in &report.not_started {
            output.push_str(&format!(
                "  {:<LABEL_WIDTH$} {:>10} {}\n",
                "- NOT RUN", "-", spec
            ));
        }
        output.push('\n');
        output.push_str(&self.report_brief(report));
        output.push('\n');
        output
    }

    fn report_brief(&self, report: &RunReport) -> String {
        let failed = report.count(SpecOutcome::Failed);
        let failed_str = if failed > 0 {
            self.paint(&failed.to_string(), "31")
        } else {
            failed.to_string()
        };
        let mut line = format!(
            "{} passed, {} failed, {} cached in {:.1}s (parallelism {})",
            self.paint(&report.count(SpecOutcome::Passed).to_string(), "32"),
            failed_str,
            report.count(SpecOutcome::Skipped),
            report.duration_ms as f64 / 1000.0,
            report.max_parallel
        );
        if report.stopped {
            line.push_str(&format!(
                ", stopped ({} aborted, {} not started)",
                report.count(SpecOutcome::Aborted),
                report.not_started.len()
            ));
        }
        line
    }

    /// Format stored results, newest first
    pub fn format_results(&self, results: &[TestResult]) -> String {
        if let Some(json) = self.json(results) {
            return json;
        }
        match self.format {
            OutputFormat::Csv => csv_table(
                &[
                    "id",
                    "timestamp",
                    "suite",
                    "spec",
                    "status",
                    "duration_ms",
                    "cpu_usage",
                    "memory_bytes",
                    "branch",
                    "commit",
                    "error",
                ],
                results.iter().map(|r| {
                    vec![
                        r.id.clone(),
                        r.timestamp.to_rfc3339(),
                        r.suite.clone(),
                        r.spec.clone(),
                        r.status.to_string(),
                        r.duration_ms.to_string(),
                        format!("{:.3}", r.performance.cpu_usage),
                        r.performance.memory_usage_bytes.to_string(),
                        r.branch.clone(),
                        r.commit.clone(),
                        r.error.clone().unwrap_or_default(),
                    ]
                }),
            ),
            OutputFormat::Summary => results
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => {
                let mut output = String::new();
                for r in results {
                    output.push_str(&format!(
                        "  {} {} {:>8}ms  {}\n",
                        r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        self.status_label(r.status),
                        r.duration_ms,
                        r.spec
                    ));
                }
                output
            }
        }
    }

    /// Format the launch queue with cache decisions
    pub fn format_plan(&self, plan: &[PlannedSpec]) -> String {
        if let Some(json) = self.json(plan) {
            return json;
        }
        match self.format {
            OutputFormat::Csv => csv_table(
                &["spec", "priority", "hash", "will_run", "reason"],
                plan.iter().map(|p| {
                    vec![
                        p.spec.key(),
                        format!("{:.4}", p.spec.priority),
                        p.spec.dependency_hash.clone(),
                        p.decision.should_run().to_string(),
                        p.decision.to_string(),
                    ]
                }),
            ),
            _ => {
                let to_run = plan.iter().filter(|p| p.decision.should_run()).count();
                let mut output = String::new();
                for (i, p) in plan.iter().enumerate() {
                    let action = if p.decision.should_run() {
                        self.paint("run ", "32")
                    } else {
                        self.paint("skip", "36")
                    };
                    output.push_str(&format!(
                        "  {:3}. {} {:.3}  {}  ({})\n",
                        i + 1,
                        action,
                        p.spec.priority,
                        p.spec.key(),
                        p.decision
                    ));
                }
                output.push_str(&format!(
                    "\n{} of {} specs will run\n",
                    to_run,
                    plan.len()
                ));
                output
            }
        }
    }

    pub fn format_suites(&self, suites: &[SuiteSummary]) -> String {
        if let Some(json) = self.json(suites) {
            return json;
        }
        match self.format {
            OutputFormat::Csv => csv_table(
                &["suite", "runs", "pass_rate", "avg_duration_ms", "flakiness", "last_run"],
                suites.iter().map(|s| {
                    vec![
                        s.name.clone(),
                        s.total_runs.to_string(),
                        format!("{:.4}", s.pass_rate),
                        format!("{:.1}", s.avg_duration_ms),
                        format!("{:.4}", s.flakiness),
                        s.last_run.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    ]
                }),
            ),
            _ => {
                let mut output = format!(
                    "  {:24} {:>6} {:>8} {:>12} {:>9}\n",
                    "Suite", "Runs", "Pass", "Avg", "Flaky"
                );
                for s in suites {
                    output.push_str(&format!(
                        "  {:24} {:>6} {:>7.1}% {:>10.0}ms {:>8.1}%\n",
                        s.name,
                        s.total_runs,
                        s.pass_rate * 100.0,
                        s.avg_duration_ms,
                        s.flakiness * 100.0
                    ));
                }
                output
            }
        }
    }

    pub fn format_trends(&self, trends: &[TrendPoint]) -> String {
        if let Some(json) = self.json(trends) {
            return json;
        }
        match self.format {
            OutputFormat::Csv => csv_table(
                &["date", "avg_duration_ms", "pass_rate", "parallelism"],
                trends.iter().map(|t| {
                    vec![
                        t.date.to_rfc3339(),
                        format!("{:.1}", t.avg_duration_ms),
                        format!("{:.4}", t.pass_rate),
                        t.parallelism.to_string(),
                    ]
                }),
            ),
            _ => {
                let mut output = String::new();
                for t in trends {
                    output.push_str(&format!(
                        "  {}  avg {:>8.0}ms  pass {:>5.1}%  x{}\n",
                        t.date.format("%Y-%m-%d %H:%M"),
                        t.avg_duration_ms,
                        t.pass_rate * 100.0,
                        t.parallelism
                    ));
                }
                output
            }
        }
    }

    pub fn format_stats(&self, stats: &HistoryStats) -> String {
        if let Some(json) = self.json(stats) {
            return json;
        }
        match self.format {
            OutputFormat::Csv => csv_table(
                &["total_runs", "pass_rate", "avg_duration_ms", "flakiness"],
                [vec![
                    stats.total_runs.to_string(),
                    format!("{:.4}", stats.pass_rate),
                    format!("{:.1}", stats.avg_duration_ms),
                    format!("{:.4}", stats.flakiness),
                ]],
            ),
            _ => format!(
                "Total runs:   {}\nPass rate:    {:.1}%\nAvg duration: {:.0}ms\nFlakiness:    {:.1}%\n",
                stats.total_runs,
                stats.pass_rate * 100.0,
                stats.avg_duration_ms,
                stats.flakiness * 100.0
            ),
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Render rows through the csv writer so quoting follows RFC 4180
fn csv_table(header: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    write_csv(header, rows)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn write_csv(
    header: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    Ok(writer.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn report() -> RunReport {
        RunReport {
            started_at: Utc::now(),
            duration_ms: 2500,
            max_parallel: 2,
            outcomes: BTreeMap::from([
                ("e2e/a.cy.ts".to_string(), SpecOutcome::Passed),
                ("e2e/b.cy.ts".to_string(), SpecOutcome::Failed),
                ("e2e/c.cy.ts".to_string(), SpecOutcome::Skipped),
            ]),
            executed: vec![
                TestResult::passed("e2e/a.cy.ts", 1200),
                TestResult::failed("e2e/b.cy.ts", 900, "AssertionError: expected"),
            ],
            not_started: Vec::new(),
            stopped: false,
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = ResultFormatter::new(OutputFormat::Json).no_color();
        assert_eq!(formatter.format, OutputFormat::Json);
        assert!(!formatter.colorize);
    }

    #[test]
    fn test_report_summary_line() {
        let output = ResultFormatter::new(OutputFormat::Summary)
            .no_color()
            .format_report(&report());
        assert_eq!(
            output,
            "1 passed, 1 failed, 1 cached in 2.5s (parallelism 2)"
        );
    }

    #[test]
    fn test_report_csv() {
        let output = ResultFormatter::new(OutputFormat::Csv).format_report(&report());
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "spec,outcome,passed");
        assert_eq!(lines[3], "e2e/c.cy.ts,skipped,true");
    }

    #[test]
    fn test_results_csv_quotes_errors() {
        let results = vec![TestResult::failed("e2e/b.cy.ts", 900, "expected \"a\", got b")];
        let output = ResultFormatter::new(OutputFormat::Csv).format_results(&results);
        assert!(output.contains("\"expected \"\"a\"\", got b\""));
    }

    fn strip_ansi(text: &str) -> String {
        regex::Regex::new(r"\x1b\[[0-9;]*m")
            .unwrap()
            .replace_all(text, "")
            .into_owned()
    }

    #[test]
    fn test_colored_tables_keep_column_alignment() {
        let colored = ResultFormatter::new(OutputFormat::Table).format_report(&report());
        let plain = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_report(&report());
        assert_ne!(colored, plain);
        assert_eq!(strip_ansi(&colored), plain);
        assert!(plain.contains("  ✓ PASSED         1200ms e2e/a.cy.ts\n"));
        assert!(plain.contains("  ○ CACHED              - e2e/c.cy.ts\n"));

        let results = report().executed;
        let colored = ResultFormatter::new(OutputFormat::Table).format_results(&results);
        let plain = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_results(&results);
        assert_eq!(strip_ansi(&colored), plain);
        let columns: Vec<_> = plain.lines().map(|l| l.find("ms  ").unwrap()).collect();
        assert!(columns.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_results_json_round_trips() {
        let results = vec![TestResult::passed("e2e/a.cy.ts", 10)];
        let output = ResultFormatter::new(OutputFormat::Json).format_results(&results);
        let parsed: Vec<TestResult> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, results);
    }
}
