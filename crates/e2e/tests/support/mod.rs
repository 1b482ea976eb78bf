//! In-memory stand-ins for the browser service and reporters

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cvkit_e2e::reporter::Reporter;
use cvkit_e2e::{
    BrowserControl, E2eError, E2eResult, ElementState, RunSummary, ScreenshotRequest, ScreenshotResult,
    SuiteResult,
};

pub const APP_ORIGIN: &str = "http://localhost:5173";

#[derive(Default)]
struct PageState {
    url: String,
    elements: HashMap<String, ElementState>,
    store: HashMap<String, serde_json::Value>,
    calls: Vec<String>,
}

/// Fake browser session: a selector -> element map plus a URL and a store.
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<PageState>,
    latency: Duration,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long first
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_element(self, selector: &str, element: ElementState) -> Self {
        self.state.lock().unwrap().elements.insert(selector.to_string(), element);
        self
    }

    pub fn with_button(self, selector: &str, text: &str) -> Self {
        self.with_element(
            selector,
            ElementState {
                count: 1,
                visible: true,
                enabled: true,
                text: Some(text.to_string()),
                attributes: HashMap::new(),
            },
        )
    }

    pub fn with_store(self, key: &str, value: serde_json::Value) -> Self {
        self.state.lock().unwrap().store.insert(key.to_string(), value);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    async fn enter(&self, call: String) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl BrowserControl for FakeBrowser {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        self.enter(format!("navigate {}", url)).await;
        let full = if url.starts_with("http") { url.to_string() } else { format!("{}{}", APP_ORIGIN, url) };
        self.state.lock().unwrap().url = full;
        Ok(())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.enter(format!("click {}", selector)).await;
        match self.state.lock().unwrap().elements.get(selector) {
            Some(el) if el.visible && el.enabled => Ok(()),
            _ => Err(E2eError::Browser(format!("element '{}' is not clickable", selector))),
        }
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.enter(format!("fill {}", selector)).await;
        let mut state = self.state.lock().unwrap();
        let element = state.elements.entry(selector.to_string()).or_insert_with(|| ElementState {
            count: 1,
            visible: true,
            enabled: true,
            ..Default::default()
        });
        element.text = Some(value.to_string());
        Ok(())
    }

    async fn wait_for(&self, selector: &str, _timeout_ms: u64) -> E2eResult<()> {
        self.enter(format!("wait {}", selector)).await;
        if self.state.lock().unwrap().elements.contains_key(selector) {
            Ok(())
        } else {
            Err(E2eError::Browser(format!("timed out waiting for '{}'", selector)))
        }
    }

    async fn query(&self, selector: &str) -> E2eResult<ElementState> {
        self.enter(format!("query {}", selector)).await;
        Ok(self.state.lock().unwrap().elements.get(selector).cloned().unwrap_or_default())
    }

    async fn current_url(&self) -> E2eResult<String> {
        self.enter("url".to_string()).await;
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn store_value(&self, key: &str) -> E2eResult<Option<serde_json::Value>> {
        self.enter(format!("store {}", key)).await;
        Ok(self.state.lock().unwrap().store.get(key).cloned())
    }

    async fn screenshot(&self, request: &ScreenshotRequest) -> E2eResult<ScreenshotResult> {
        self.enter(format!("screenshot {}", request.name)).await;
        Ok(ScreenshotResult {
            success: true,
            path: Some(format!("screenshots/{}.png", request.name).into()),
            size: 2048,
            error: None,
        })
    }
}

/// Reporter that records the callbacks it receives
#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl RecordingReporter {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) -> E2eResult<()> {
        self.events.lock().unwrap().push(event);
        if self.fail {
            return Err(E2eError::Reporter { reporter: "recording".into(), reason: "disk full".into() });
        }
        Ok(())
    }
}

impl Reporter for RecordingReporter {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn on_suite_start(&mut self, suite: &str) -> E2eResult<()> {
        self.record(format!("start {}", suite))
    }

    fn on_suite_end(&mut self, result: &SuiteResult) -> E2eResult<()> {
        self.record(format!(
            "end {} total={} failed={}",
            result.name, result.summary.total, result.summary.failed
        ))
    }

    fn on_run_complete(&mut self, suites: &[SuiteResult], summary: &RunSummary) -> E2eResult<()> {
        self.record(format!("complete suites={} failed={}", suites.len(), summary.failed))
    }
}
