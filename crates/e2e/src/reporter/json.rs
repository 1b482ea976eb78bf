//! JSON report file

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{unix_millis, Reporter};
use crate::error::E2eResult;
use crate::result::{RunSummary, SuiteResult};

/// On-disk layout of `test-results-<unixMillis>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub timestamp: DateTime<Utc>,
    pub summary: RunSummary,
    pub suites: Vec<SuiteResult>,
}

pub struct JsonReporter {
    output_dir: PathBuf,
    suites: Vec<SuiteResult>,
    last_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            suites: Vec::new(),
            last_path: None,
        }
    }

    /// Path of the most recently written report
    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }
}

impl Reporter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn on_suite_end(&mut self, result: &SuiteResult) -> E2eResult<()> {
        self.suites.push(result.clone());
        Ok(())
    }

    fn on_run_complete(&mut self, _suites: &[SuiteResult], summary: &RunSummary) -> E2eResult<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        let report = JsonReport {
            timestamp: Utc::now(),
            summary: *summary,
            suites: std::mem::take(&mut self.suites),
        };
        let path = self.output_dir.join(format!("test-results-{}.json", unix_millis()));
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;

        info!("JSON report written to: {}", path.display());
        self.last_path = Some(path);
        Ok(())
    }
}
