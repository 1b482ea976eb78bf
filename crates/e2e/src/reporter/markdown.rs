//! Markdown report file

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use super::{unix_millis, Reporter};
use crate::error::{E2eError, E2eResult};
use crate::result::{RunSummary, SuiteResult, TestStatus};

pub struct MarkdownReporter {
    output_dir: PathBuf,
    suites: Vec<SuiteResult>,
    last_path: Option<PathBuf>,
}

impl MarkdownReporter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            suites: Vec::new(),
            last_path: None,
        }
    }

    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    pub fn render(suites: &[SuiteResult], summary: &RunSummary) -> Result<String, fmt::Error> {
        let mut doc = String::new();
        write_report(&mut doc, suites, summary)?;
        Ok(doc)
    }
}

/// Write the whole report into `out`
pub fn write_report<W: fmt::Write>(out: &mut W, suites: &[SuiteResult], summary: &RunSummary) -> fmt::Result {
    let verdict = if summary.failed == 0 { "✅ Passed" } else { "❌ Failed" };

    writeln!(out, "# Test Report\n")?;
    writeln!(out, "Generated: {}\n", Utc::now().to_rfc3339())?;
    writeln!(out, "**Result:** {}\n", verdict)?;
    writeln!(out, "| Suites | Tests | Passed | Failed | Skipped |")?;
    writeln!(out, "|-------:|------:|-------:|-------:|--------:|")?;
    writeln!(
        out,
        "| {} | {} | {} | {} | {} |\n",
        summary.total_suites, summary.total_tests, summary.passed, summary.failed, summary.skipped
    )?;

    for suite in suites {
        write_suite(out, suite)?;
    }
    Ok(())
}

fn write_suite<W: fmt::Write>(out: &mut W, suite: &SuiteResult) -> fmt::Result {
    writeln!(out, "## {}\n", suite.name)?;
    writeln!(
        out,
        "{} passed, {} failed, {} skipped in {} ms\n",
        suite.summary.passed, suite.summary.failed, suite.summary.skipped, suite.duration_ms
    )?;
    if let Some(error) = &suite.error {
        writeln!(out, "> **Suite aborted:** {}\n", error)?;
    }
    if suite.tests.is_empty() {
        return Ok(());
    }

    writeln!(out, "| Status | Test | Duration |")?;
    writeln!(out, "|--------|------|---------:|")?;
    for test in &suite.tests {
        let icon = match test.status {
            TestStatus::Passed => "✅",
            TestStatus::Failed => "❌",
            TestStatus::Skipped => "⏭️",
            TestStatus::Pending | TestStatus::Running => "…",
        };
        writeln!(out, "| {} | {} | {} ms |", icon, escape(&test.name), test.duration_ms)?;
    }
    writeln!(out)?;

    let failures: Vec<_> = suite.tests.iter().filter_map(|t| t.error.as_ref().map(|e| (t, e))).collect();
    if !failures.is_empty() {
        writeln!(out, "### Failures\n")?;
        for (test, error) in failures {
            writeln!(out, "- **{}**: `{}`", test.name, error.message)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

impl Reporter for MarkdownReporter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn on_suite_end(&mut self, result: &SuiteResult) -> E2eResult<()> {
        self.suites.push(result.clone());
        Ok(())
    }

    fn on_run_complete(&mut self, _suites: &[SuiteResult], summary: &RunSummary) -> E2eResult<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        let doc = Self::render(&self.suites, summary).map_err(|e| E2eError::Reporter {
            reporter: self.name().to_string(),
            reason: e.to_string(),
        })?;
        self.suites.clear();
        let path = self.output_dir.join(format!("test-report-{}.md", unix_millis()));
        std::fs::write(&path, doc)?;

        info!("Markdown report written to: {}", path.display());
        self.last_path = Some(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestError;
    use crate::result::TestResult;
    use std::time::Duration;

    #[test]
    fn test_render_lists_tests_and_failures() {
        let mut ok = TestResult::pending("parses | pipes");
        ok.finish(Duration::from_millis(2), Ok(()));
        let mut bad = TestResult::pending("exports");
        bad.finish(Duration::from_millis(2), Err(TestError::assertion("no file")));
        let suites = vec![
            SuiteResult::completed("export", Utc::now(), Duration::from_millis(4), vec![ok, bad]),
            SuiteResult::aborted("sync", Utc::now(), Duration::ZERO, "beforeAll hook failed: offline"),
        ];
        let summary = RunSummary::from_suites(&suites);

        let doc = MarkdownReporter::render(&suites, &summary).unwrap();
        assert!(doc.contains("**Result:** ❌ Failed"));
        assert!(doc.contains("| 2 | 2 | 1 | 2 | 0 |"));
        assert!(doc.contains("parses \\| pipes"));
        assert!(doc.contains("- **exports**: `Assertion failed: no file`"));
        assert!(doc.contains("> **Suite aborted:** beforeAll hook failed: offline"));
    }

    #[test]
    fn test_writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = MarkdownReporter::new(dir.path());
        let suite = SuiteResult::completed("empty", Utc::now(), Duration::ZERO, vec![]);
        let summary = RunSummary::from_suites(std::slice::from_ref(&suite));
        reporter.on_suite_end(&suite).unwrap();
        reporter.on_run_complete(&[suite], &summary).unwrap();

        let content = std::fs::read_to_string(reporter.last_path().unwrap()).unwrap();
        assert!(content.contains("## empty"));
    }

    /// Accepts `limit` bytes, then refuses
    struct Capped {
        written: usize,
        limit: usize,
    }

    impl fmt::Write for Capped {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.written += s.len();
            if self.written > self.limit {
                Err(fmt::Error)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_write_error_is_propagated() {
        let suite = SuiteResult::completed("export", Utc::now(), Duration::ZERO, vec![]);
        let summary = RunSummary::from_suites(std::slice::from_ref(&suite));
        let mut out = Capped { written: 0, limit: 40 };
        assert!(write_report(&mut out, &[suite], &summary).is_err());
    }
}
