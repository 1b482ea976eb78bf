//! Main test runner that orchestrates suites and reporters

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::error::E2eResult;
use crate::reporter::{self, Reporter};
use crate::result::{RunSummary, SuiteResult};
use crate::suite::{SuiteError, TestSuite};

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub suites: Vec<SuiteResult>,
    pub summary: RunSummary,
    /// Error of the suite that aborted the run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        TestRunner::exit_code(&self.summary)
    }
}

/// A suite failed outside any single test. `result` is the synthetic
/// zero-test, one-failure record already handed to the reporters.
#[derive(Error, Debug, Clone)]
#[error("{source}")]
pub struct SuiteAborted {
    pub result: SuiteResult,
    pub source: SuiteError,
}

pub struct TestRunner {
    config: RunnerConfig,
    suites: Vec<TestSuite>,
    reporters: Vec<Box<dyn Reporter>>,
}

impl TestRunner {
    /// Create a test runner with the reporters named in the configuration
    pub fn new(config: RunnerConfig) -> Self {
        let reporters = config
            .reporters
            .iter()
            .map(|kind| reporter::create(*kind, &config.output_dir, config.verbose))
            .collect();
        Self::with_reporters(config, reporters)
    }

    /// Create a test runner with explicit reporters, ignoring `config.reporters`
    pub fn with_reporters(config: RunnerConfig, reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self {
            config,
            suites: Vec::new(),
            reporters,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn add_suite(&mut self, suite: TestSuite) -> &mut Self {
        self.suites.push(suite);
        self
    }

    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) -> &mut Self {
        self.reporters.push(reporter);
        self
    }

    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    /// 1 if any test failed, 0 otherwise. Skips do not count.
    pub fn exit_code(summary: &RunSummary) -> i32 {
        if summary.failed > 0 {
            1
        } else {
            0
        }
    }

    /// Run one suite and notify reporters.
    pub async fn run(&mut self, suite: &mut TestSuite) -> Result<SuiteResult, SuiteAborted> {
        let name = suite.name().to_string();
        self.notify(|r| r.on_suite_start(&name));

        let start_time = Utc::now();
        let started = Instant::now();

        match suite.run(self.config.filter.as_deref()).await {
            Ok(result) => {
                self.notify(|r| r.on_suite_end(&result));
                Ok(result)
            }
            Err(source) => {
                error!("{}", source);
                let result = SuiteResult::aborted(&name, start_time, started.elapsed(), source.source.to_string());
                self.notify(|r| r.on_suite_end(&result));
                Err(SuiteAborted { result, source })
            }
        }
    }

    /// Run every registered suite in registration order.
    ///
    /// Stops early when `bail` is set and a suite had failures, or when a
    /// suite aborts. Reporters always receive `on_run_complete`.
    pub async fn run_all(&mut self) -> RunReport {
        let mut suites = std::mem::take(&mut self.suites);
        let mut results: Vec<SuiteResult> = Vec::with_capacity(suites.len());
        let mut aborted = None;

        info!("Running {} suite(s)...", suites.len());

        for suite in suites.iter_mut() {
            if self.config.bail && results.last().map_or(false, SuiteResult::has_failures) {
                info!("Bail: skipping remaining suites after failure");
                break;
            }

            match self.run(suite).await {
                Ok(result) => results.push(result),
                Err(SuiteAborted { result, source }) => {
                    results.push(result);
                    aborted = Some(source.to_string());
                    break;
                }
            }
        }

        self.suites = suites;

        let summary = RunSummary::from_suites(&results);
        info!(
            "Test Results: {} passed, {} failed, {} skipped across {} suite(s)",
            summary.passed, summary.failed, summary.skipped, summary.total_suites
        );
        self.notify(|r| r.on_run_complete(&results, &summary));

        RunReport {
            suites: results,
            summary,
            aborted,
        }
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn Reporter) -> E2eResult<()>) {
        for reporter in self.reporters.iter_mut() {
            if let Err(e) = f(reporter.as_mut()) {
                warn!("Reporter '{}' failed: {}", reporter.name(), e);
            }
        }
    }
}
