//! Colored terminal output

use std::io::Write;

use colored::Colorize;

use super::Reporter;
use crate::error::E2eResult;
use crate::result::{RunSummary, SuiteResult, TestResult, TestStatus};

pub struct ConsoleReporter {
    out: Box<dyn Write + Send>,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(out: Box<dyn Write + Send>, verbose: bool) -> Self {
        Self { out, verbose }
    }

    pub fn stdout(verbose: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), verbose)
    }

    fn write_test(&mut self, test: &TestResult) -> E2eResult<()> {
        let symbol = match test.status {
            TestStatus::Passed => "✓".green(),
            TestStatus::Failed => "✗".red(),
            TestStatus::Skipped => "○".yellow(),
            TestStatus::Pending | TestStatus::Running => "?".normal(),
        };
        let retries = if test.retries > 0 {
            format!(" [{} retr{}]", test.retries, if test.retries == 1 { "y" } else { "ies" })
        } else {
            String::new()
        };
        writeln!(
            self.out,
            "  {} {} {}{}",
            symbol,
            test.name,
            format!("({} ms)", test.duration_ms).dimmed(),
            retries
        )?;

        if let Some(error) = &test.error {
            writeln!(self.out, "      {}", error.message.red())?;
            if self.verbose {
                if let Some(stack) = &error.stack {
                    writeln!(self.out, "      {}", stack.dimmed())?;
                }
            }
        }
        Ok(())
    }
}

impl Reporter for ConsoleReporter {
    fn name(&self) -> &'static str {
        "console"
    }

    fn on_suite_start(&mut self, suite: &str) -> E2eResult<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", suite.bold())?;
        Ok(())
    }

    fn on_suite_end(&mut self, result: &SuiteResult) -> E2eResult<()> {
        for test in &result.tests {
            self.write_test(test)?;
        }
        if let Some(error) = &result.error {
            writeln!(self.out, "  {} {}", "✗".red(), error.red())?;
        }
        if self.verbose {
            writeln!(
                self.out,
                "  {}",
                format!(
                    "{} passed, {} failed, {} skipped in {} ms",
                    result.summary.passed, result.summary.failed, result.summary.skipped, result.duration_ms
                )
                .dimmed()
            )?;
        }
        Ok(())
    }

    fn on_run_complete(&mut self, suites: &[SuiteResult], summary: &RunSummary) -> E2eResult<()> {
        let duration_ms: u64 = suites.iter().map(|s| s.duration_ms).sum();
        let rule = "─".repeat(50);

        writeln!(self.out)?;
        writeln!(self.out, "{}", rule)?;
        writeln!(
            self.out,
            "Suites: {}   Tests: {}   Time: {} ms",
            summary.total_suites, summary.total_tests, duration_ms
        )?;
        writeln!(
            self.out,
            "{}   {}   {}",
            format!("{} passed", summary.passed).green(),
            format!("{} failed", summary.failed).red(),
            format!("{} skipped", summary.skipped).yellow()
        )?;
        let banner = if summary.failed == 0 {
            "ALL TESTS PASSED".green().bold()
        } else {
            "TESTS FAILED".red().bold()
        };
        writeln!(self.out, "{}", banner)?;
        writeln!(self.out, "{}", rule)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_renders_tests_and_banner() {
        let buffer = Buffer::default();
        let mut reporter = ConsoleReporter::new(Box::new(buffer.clone()), true);

        let mut ok = TestResult::pending("renders preview");
        ok.finish(Duration::from_millis(5), Ok(()));
        let mut bad = TestResult::pending("exports pdf");
        bad.finish(Duration::from_millis(9), Err(TestError::assertion("download missing")));
        let suite = SuiteResult::completed("export", chrono::Utc::now(), Duration::from_millis(14), vec![ok, bad]);
        let summary = RunSummary::from_suites(std::slice::from_ref(&suite));

        reporter.on_suite_start("export").unwrap();
        reporter.on_suite_end(&suite).unwrap();
        reporter.on_run_complete(&[suite], &summary).unwrap();

        let text = buffer.text();
        assert!(text.contains("renders preview"));
        assert!(text.contains("Assertion failed: download missing"));
        assert!(text.contains("1 passed"));
        assert!(text.contains("TESTS FAILED"));
    }
}
