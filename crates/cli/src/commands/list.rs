//! List Commands

use anyhow::Result;
use clap::Args;
use cvkit_e2e::SuiteSpec;
use serde::Serialize;

use super::SpecArgs;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub specs: SpecArgs,

    /// One row per test instead of per suite
    #[arg(long)]
    pub tests: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct SuiteRow {
    name: String,
    tests: usize,
    skipped: usize,
    parallel: bool,
    retries: u32,
    tags: Vec<String>,
    description: String,
}

impl TableDisplay for SuiteRow {
    fn headers() -> Vec<&'static str> {
        vec!["SUITE", "TESTS", "SKIPPED", "PARALLEL", "RETRIES", "TAGS", "DESCRIPTION"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tests.to_string(),
            self.skipped.to_string(),
            if self.parallel { "yes" } else { "no" }.to_string(),
            self.retries.to_string(),
            self.tags.join(", "),
            self.description.clone(),
        ]
    }
}

impl From<&SuiteSpec> for SuiteRow {
    fn from(spec: &SuiteSpec) -> Self {
        Self {
            name: spec.name.clone(),
            tests: spec.tests.len(),
            skipped: spec.tests.iter().filter(|t| t.skip).count(),
            parallel: spec.parallel,
            retries: spec.retries,
            tags: spec.tags.clone(),
            description: spec.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TestRow {
    suite: String,
    name: String,
    skip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    steps: usize,
}

impl TableDisplay for TestRow {
    fn headers() -> Vec<&'static str> {
        vec!["SUITE", "TEST", "SKIP", "TIMEOUT", "STEPS"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.name.clone(),
            if self.skip { "yes" } else { "" }.to_string(),
            self.timeout_ms.map(|ms| format!("{} ms", ms)).unwrap_or_else(|| "-".to_string()),
            self.steps.to_string(),
        ]
    }
}

fn test_rows(specs: &[SuiteSpec]) -> Vec<TestRow> {
    specs
        .iter()
        .flat_map(|spec| {
            spec.tests.iter().map(move |test| TestRow {
                suite: spec.name.clone(),
                name: test.name.clone(),
                skip: test.skip,
                timeout_ms: test.timeout_ms.or(spec.timeout_ms),
                steps: test.steps.len(),
            })
        })
        .collect()
}

pub fn execute(args: ListArgs) -> Result<()> {
    let specs = args.specs.load()?;

    if args.tests {
        print_list(&test_rows(&specs), args.format);
    } else {
        let rows: Vec<SuiteRow> = specs.iter().map(SuiteRow::from).collect();
        print_list(&rows, args.format);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
name: resume-editor
tags: [editor]
timeout_ms: 8000
tests:
  - name: adds entry
    steps:
      - action: navigate
        url: /editor
      - action: assert
        url_contains: /editor
  - name: exports pdf
    skip: true
    timeout_ms: 60000
    steps:
      - action: click
        selector: '#export'
"#;

    #[test]
    fn test_suite_row_counts_skips() {
        let spec = SuiteSpec::from_yaml(SUITE).unwrap();
        let row = SuiteRow::from(&spec);
        assert_eq!(row.tests, 2);
        assert_eq!(row.skipped, 1);
        assert_eq!(row.row()[5], "editor");
    }

    #[test]
    fn test_test_rows_inherit_suite_timeout() {
        let spec = SuiteSpec::from_yaml(SUITE).unwrap();
        let rows = test_rows(&[spec]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timeout_ms, Some(8000));
        assert_eq!(rows[0].steps, 2);
        assert_eq!(rows[1].timeout_ms, Some(60000));
        assert!(rows[1].skip);
    }
}
