//! Result records produced by test cases, suites and runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TestError;

/// Lifecycle state of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TestStatus::Passed | TestStatus::Failed | TestStatus::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "PENDING",
            TestStatus::Running => "RUNNING",
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error detail attached to a failed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFailure {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl From<&TestError> for TestFailure {
    fn from(e: &TestError) -> Self {
        let stack = match e {
            TestError::Hook { kind, .. } => Some(format!("at {} hook", kind)),
            TestError::Panicked(_) => Some("at test body (panic)".to_string()),
            _ => None,
        };
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
            stack,
        }
    }
}

/// Result of one test case execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestFailure>,
    /// Extra attempts consumed by suite-level retries
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl TestResult {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Pending,
            duration_ms: 0,
            start_time: Utc::now(),
            end_time: None,
            error: None,
            retries: 0,
        }
    }

    /// Move to a terminal state. `end_time` is derived from the measured
    /// elapsed time so that `duration == end_time - start_time` holds exactly.
    pub(crate) fn finish(&mut self, elapsed: Duration, outcome: Result<(), TestError>) {
        let duration_ms = elapsed.as_millis() as u64;
        self.duration_ms = duration_ms;
        self.end_time = Some(self.start_time + chrono::Duration::milliseconds(duration_ms as i64));
        match outcome {
            Ok(()) => {
                self.status = TestStatus::Passed;
                self.error = None;
            }
            Err(TestError::Skipped) => {
                self.status = TestStatus::Skipped;
                self.error = None;
            }
            Err(e) => {
                self.status = TestStatus::Failed;
                self.error = Some(TestFailure::from(&e));
            }
        }
    }

    /// Turn a result into a failure after the fact (e.g. a failing afterEach hook).
    pub(crate) fn fail_with(&mut self, err: &TestError) {
        self.status = TestStatus::Failed;
        self.error = Some(TestFailure::from(err));
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == TestStatus::Failed
    }
}

/// Per-suite status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SuiteSummary {
    pub fn from_tests(tests: &[TestResult]) -> Self {
        let mut summary = SuiteSummary { total: tests.len(), ..Default::default() };
        for test in tests {
            match test.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Skipped => summary.skipped += 1,
                // A finished suite only holds terminal results
                TestStatus::Pending | TestStatus::Running => {}
            }
        }
        summary
    }
}

/// Result of one suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub name: String,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub summary: SuiteSummary,
    pub tests: Vec<TestResult>,
    /// Set only on the synthetic result recorded for a suite that aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuiteResult {
    pub(crate) fn completed(
        name: impl Into<String>,
        start_time: DateTime<Utc>,
        elapsed: Duration,
        tests: Vec<TestResult>,
    ) -> Self {
        let duration_ms = elapsed.as_millis() as u64;
        Self {
            name: name.into(),
            duration_ms,
            start_time,
            end_time: Some(start_time + chrono::Duration::milliseconds(duration_ms as i64)),
            summary: SuiteSummary::from_tests(&tests),
            tests,
            error: None,
        }
    }

    /// Zero-test, one-failure stand-in for a suite whose run aborted.
    pub fn aborted(name: impl Into<String>, start_time: DateTime<Utc>, elapsed: Duration, error: impl Into<String>) -> Self {
        let duration_ms = elapsed.as_millis() as u64;
        Self {
            name: name.into(),
            duration_ms,
            start_time,
            end_time: Some(start_time + chrono::Duration::milliseconds(duration_ms as i64)),
            summary: SuiteSummary { total: 0, passed: 0, failed: 1, skipped: 0 },
            tests: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

/// Totals across every suite of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_suites: usize,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn from_suites(suites: &[SuiteResult]) -> Self {
        suites.iter().fold(
            RunSummary { total_suites: suites.len(), ..Default::default() },
            |mut acc, suite| {
                acc.total_tests += suite.summary.total;
                acc.passed += suite.summary.passed;
                acc.failed += suite.summary.failed;
                acc.skipped += suite.summary.skipped;
                acc
            },
        )
    }
}
