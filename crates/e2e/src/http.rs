//! HTTP client for the browser-control REST service

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{BrowserControl, ElementState, ScreenshotRequest, ScreenshotResult};
use crate::error::{E2eError, E2eResult};

/// Response envelope used by every service endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlBody {
    url: String,
}

/// Browser session driven through the REST facade
pub struct HttpBrowser {
    client: reqwest::Client,
    base_url: String,
    startup_timeout: Duration,
}

impl HttpBrowser {
    pub fn new(config: BrowserConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            startup_timeout: config.startup_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll `/health` until the service answers or the startup timeout expires
    pub async fn wait_until_ready(&self) -> E2eResult<()> {
        let health_url = format!("{}/health", self.base_url);
        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < self.startup_timeout {
            attempts += 1;

            match self.client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Browser service is healthy at {}", self.base_url);
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for browser service...");
                    }
                    // Connection refused is expected while the service boots
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServiceHealthCheck(attempts))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> E2eResult<Option<T>> {
        let url = format!("{}/api/browser/{}", self.base_url, path);
        debug!("POST {}", url);
        let resp = self.client.post(&url).json(&body).send().await?;
        Self::unwrap(path, resp.json::<Envelope<T>>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> E2eResult<Option<T>> {
        let url = format!("{}/api/browser/{}", self.base_url, path);
        debug!("GET {}", url);
        let resp = self.client.get(&url).send().await?;
        Self::unwrap(path, resp.json::<Envelope<T>>().await?)
    }

    fn unwrap<T>(path: &str, envelope: Envelope<T>) -> E2eResult<Option<T>> {
        if envelope.success {
            Ok(envelope.data)
        } else {
            Err(E2eError::Browser(format!(
                "{}: {}",
                path,
                envelope.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }

    fn require<T>(path: &str, data: Option<T>) -> E2eResult<T> {
        data.ok_or_else(|| E2eError::Browser(format!("{}: response carried no data", path)))
    }
}

#[async_trait]
impl BrowserControl for HttpBrowser {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        self.post::<serde_json::Value>("navigate", json!({ "url": url })).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.post::<serde_json::Value>("click", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.post::<serde_json::Value>("fill", json!({ "selector": selector, "value": value }))
            .await?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> E2eResult<()> {
        self.post::<serde_json::Value>("wait", json!({ "selector": selector, "timeout": timeout_ms }))
            .await?;
        Ok(())
    }

    async fn query(&self, selector: &str) -> E2eResult<ElementState> {
        let data = self.post("query", json!({ "selector": selector })).await?;
        Self::require("query", data)
    }

    async fn current_url(&self) -> E2eResult<String> {
        let data: Option<UrlBody> = self.get("url").await?;
        Ok(Self::require("url", data)?.url)
    }

    async fn store_value(&self, key: &str) -> E2eResult<Option<serde_json::Value>> {
        self.post("store", json!({ "key": key })).await
    }

    async fn screenshot(&self, request: &ScreenshotRequest) -> E2eResult<ScreenshotResult> {
        let body = serde_json::to_value(request)?;
        let data = self.post("screenshot", body).await?;
        Self::require("screenshot", data)
    }
}

/// Configuration for [`HttpBrowser`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Base URL of the browser-control service
    pub base_url: String,

    /// Per-request timeout
    #[serde(with = "millis")]
    pub request_timeout: Duration,

    /// How long to wait for `/health` before giving up
    #[serde(with = "millis")]
    pub startup_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3001".to_string(),
            request_timeout: Duration::from_secs(30),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
