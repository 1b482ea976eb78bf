//! Run Command

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use cvkit_e2e::http::HttpBrowser;
use cvkit_e2e::service::{ServiceConfig, ServiceHandle};
use cvkit_e2e::{ReporterKind, RunnerConfig, SharedBrowser, TestRunner};
use tracing::info;

use super::SpecArgs;
use crate::output::print_warning;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Runner configuration file (TOML)
    #[arg(short, long, env = "CVKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub specs: SpecArgs,

    /// Reporters to use (console, json, markdown)
    #[arg(short, long = "reporter", env = "CVKIT_REPORTERS", value_delimiter = ',')]
    pub reporters: Vec<ReporterKind>,

    /// Stop after the first suite with a failing test
    #[arg(long, env = "CVKIT_BAIL")]
    pub bail: bool,

    /// Only run tests whose name contains this text
    #[arg(short, long, env = "CVKIT_FILTER")]
    pub filter: Option<String>,

    /// Directory for json and markdown reports
    #[arg(short, long, env = "CVKIT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Default per-test timeout in milliseconds
    #[arg(long, env = "CVKIT_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Browser-control service URL
    #[arg(long, env = "CVKIT_BASE_URL")]
    pub base_url: Option<String>,

    /// Spawn the browser-control service for this run
    #[arg(long, env = "CVKIT_SPAWN_SERVICE")]
    pub spawn_service: bool,

    /// Program that starts the service
    #[arg(long, env = "CVKIT_SERVICE_COMMAND", default_value = "node")]
    pub service_command: String,

    /// Arguments for the service program
    #[arg(long = "service-arg", default_value = "browser-service/server.js")]
    pub service_args: Vec<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

impl RunArgs {
    /// Config file, then environment and flags on top
    pub fn resolve_config(&self, verbose: bool) -> Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RunnerConfig::default(),
        };

        if !self.reporters.is_empty() {
            config.reporters = self.reporters.clone();
        }
        config.bail |= self.bail;
        config.verbose |= verbose;
        if let Some(filter) = &self.filter {
            config.filter = Some(filter.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.default_timeout_ms = ms;
        }
        if let Some(url) = &self.base_url {
            config.browser.base_url = url.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            command: self.service_command.clone(),
            args: self.service_args.clone(),
            headless: !self.headed,
            ..Default::default()
        }
    }
}

/// Run the selected suites; returns the process exit code
pub async fn execute(args: RunArgs, verbose: bool) -> Result<i32> {
    let mut config = args.resolve_config(verbose)?;
    let specs = args.specs.load()?;
    if specs.is_empty() {
        print_warning(&format!("No suites found in {}", args.specs.specs.display()));
    }

    // Also killed on drop if an error returns early
    let service = if args.spawn_service {
        let handle = ServiceHandle::spawn(args.service_config())
            .await
            .context("Failed to start browser service")?;
        config.browser.base_url = handle.base_url().to_string();
        Some(handle)
    } else {
        None
    };

    let browser = HttpBrowser::new(config.browser.clone())?;
    browser
        .wait_until_ready()
        .await
        .with_context(|| format!("Browser service at {} is not ready", browser.base_url()))?;
    let browser: SharedBrowser = Arc::new(browser);

    let default_timeout = Duration::from_millis(config.default_timeout_ms);
    let mut runner = TestRunner::new(config);
    for spec in specs {
        runner.add_suite(spec.into_suite(browser.clone(), default_timeout));
    }

    let report = runner.run_all().await;
    if let Some(reason) = &report.aborted {
        print_warning(&format!("Run aborted: {}", reason));
    }
    info!(
        "Run finished: {} passed, {} failed, {} skipped",
        report.summary.passed, report.summary.failed, report.summary.skipped
    );

    if let Some(mut handle) = service {
        if let Err(e) = handle.shutdown().await {
            print_warning(&format!("Browser service did not stop cleanly: {}", e));
        }
    }
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        let mut full = vec!["cvkit-e2e"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_defaults_without_file_or_flags() {
        let config = parse(&[]).resolve_config(false).unwrap();
        assert_eq!(config.reporters, vec![ReporterKind::Console]);
        assert!(!config.bail);
        assert_eq!(config.default_timeout_ms, 30_000);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cvkit.toml");
        std::fs::write(
            &path,
            "reporters = [\"json\"]\nfilter = \"editor\"\ndefault_timeout_ms = 5000\n",
        )
        .unwrap();

        let args = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--reporter",
            "console,markdown",
            "--filter",
            "export",
            "--bail",
        ]);
        let config = args.resolve_config(true).unwrap();
        assert_eq!(config.reporters, vec![ReporterKind::Console, ReporterKind::Markdown]);
        assert_eq!(config.filter.as_deref(), Some("export"));
        assert_eq!(config.default_timeout_ms, 5000);
        assert!(config.bail);
        assert!(config.verbose);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse(&["--timeout-ms", "0"]).resolve_config(false).unwrap_err();
        assert!(err.to_string().contains("default_timeout_ms"));
    }

    #[test]
    fn test_service_config_from_flags() {
        let args = parse(&["--service-command", "deno", "--service-arg", "svc.ts", "--headed"]);
        let service = args.service_config();
        assert_eq!(service.command, "deno");
        assert_eq!(service.args, vec!["svc.ts".to_string()]);
        assert!(!service.headless);
    }
}
