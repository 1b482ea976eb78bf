//! Reporters: passive sinks for suite and run results
//!
//! Reporters never influence statuses, timing or the exit code. The runner
//! logs a reporter error and carries on.

use std::path::Path;

use crate::config::ReporterKind;
use crate::error::E2eResult;
use crate::result::{RunSummary, SuiteResult};

pub mod console;
pub mod json;
pub mod markdown;

pub use console::ConsoleReporter;
pub use json::JsonReporter;
pub use markdown::MarkdownReporter;

pub trait Reporter: Send {
    fn name(&self) -> &'static str;

    fn on_suite_start(&mut self, _suite: &str) -> E2eResult<()> {
        Ok(())
    }

    fn on_suite_end(&mut self, result: &SuiteResult) -> E2eResult<()>;

    fn on_run_complete(&mut self, suites: &[SuiteResult], summary: &RunSummary) -> E2eResult<()>;
}

/// Build the reporter for a configured kind
pub fn create(kind: ReporterKind, output_dir: &Path, verbose: bool) -> Box<dyn Reporter> {
    match kind {
        ReporterKind::Console => Box::new(ConsoleReporter::stdout(verbose)),
        ReporterKind::Json => Box::new(JsonReporter::new(output_dir)),
        ReporterKind::Markdown => Box::new(MarkdownReporter::new(output_dir)),
    }
}

/// Milliseconds since the Unix epoch, used to name report files
pub(crate) fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
