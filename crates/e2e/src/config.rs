//! Runner configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{E2eError, E2eResult};
use crate::http::BrowserConfig;

/// Reporter selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    Console,
    Json,
    Markdown,
}

impl FromStr for ReporterKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(ReporterKind::Console),
            "json" => Ok(ReporterKind::Json),
            "markdown" | "md" => Ok(ReporterKind::Markdown),
            other => Err(E2eError::InvalidConfig(format!("unknown reporter '{}'", other))),
        }
    }
}

/// Configuration for [`crate::TestRunner`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Reporters to drive, in order
    pub reporters: Vec<ReporterKind>,

    /// Stop after the first suite with a failure
    pub bail: bool,

    /// More detail from the console reporter
    pub verbose: bool,

    /// Substring matched against test names in every suite
    pub filter: Option<String>,

    /// Where the json and markdown reporters write
    pub output_dir: PathBuf,

    /// Timeout for declarative suites that do not set one
    pub default_timeout_ms: u64,

    /// Browser-control service
    pub browser: BrowserConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            reporters: vec![ReporterKind::Console],
            bail: false,
            verbose: false,
            filter: None,
            output_dir: PathBuf::from("./test-results"),
            default_timeout_ms: 30_000,
            browser: BrowserConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load from a TOML file; missing keys take their defaults
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(E2eError::InvalidConfig("default_timeout_ms must be positive".into()));
        }
        if matches!(&self.filter, Some(f) if f.is_empty()) {
            return Err(E2eError::InvalidConfig("filter must not be empty".into()));
        }
        Ok(())
    }
}
