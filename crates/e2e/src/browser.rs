//! Browser-control collaborator
//!
//! The runner never drives a browser itself. Everything it needs from the
//! page goes through [`BrowserControl`], implemented over HTTP by
//! [`crate::http::HttpBrowser`] and by in-memory fakes in tests.
//!
//! One implementation instance maps to one live browser session. Tests of a
//! parallel suite that share an instance share that session and can observe
//! each other's navigation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Snapshot of the elements matching a selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    /// Number of elements matching the selector
    pub count: usize,

    /// Visibility of the first match
    #[serde(default)]
    pub visible: bool,

    /// Whether the first match accepts input
    #[serde(default)]
    pub enabled: bool,

    /// Text content of the first match
    #[serde(default)]
    pub text: Option<String>,

    /// Attributes of the first match
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ElementState {
    pub fn exists(&self) -> bool {
        self.count > 0
    }
}

/// Outcome of a screenshot request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotResult {
    pub success: bool,

    #[serde(default)]
    pub path: Option<PathBuf>,

    /// File size in bytes
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub error: Option<String>,
}

/// Options for a screenshot request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRequest {
    pub name: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub full_page: bool,
}

#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// Navigate the session to a URL (relative URLs resolve against the app root)
    async fn navigate(&self, url: &str) -> E2eResult<()>;

    async fn click(&self, selector: &str) -> E2eResult<()>;

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    /// Wait until the selector is present, failing after `timeout_ms`
    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> E2eResult<()>;

    async fn query(&self, selector: &str) -> E2eResult<ElementState>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Read a value from the application's client-side store
    async fn store_value(&self, key: &str) -> E2eResult<Option<serde_json::Value>>;

    async fn screenshot(&self, request: &ScreenshotRequest) -> E2eResult<ScreenshotResult>;
}

pub type SharedBrowser = Arc<dyn BrowserControl>;
