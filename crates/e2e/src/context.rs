//! Per-run context handed to test bodies

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::assertions::Assertions;
use crate::browser::{ElementState, ScreenshotRequest, ScreenshotResult, SharedBrowser};
use crate::error::{E2eResult, TestError};

/// Browser handle whose every call races the owning test's cancellation token.
///
/// Once the token fires (test timed out) further calls fail immediately with
/// [`TestError::Cancelled`] and in-flight requests are dropped.
#[derive(Clone)]
pub struct Page {
    browser: SharedBrowser,
    cancel: CancellationToken,
}

impl Page {
    pub fn new(browser: SharedBrowser, cancel: CancellationToken) -> Self {
        Self { browser, cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn guard<T>(&self, op: &str, fut: impl Future<Output = E2eResult<T>>) -> Result<T, TestError> {
        if self.cancel.is_cancelled() {
            return Err(TestError::Cancelled(op.to_string()));
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TestError::Cancelled(op.to_string())),
            res = fut => res.map_err(TestError::from),
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<(), TestError> {
        self.guard("navigate", self.browser.navigate(url)).await
    }

    pub async fn click(&self, selector: &str) -> Result<(), TestError> {
        self.guard("click", self.browser.click(selector)).await
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<(), TestError> {
        self.guard("fill", self.browser.fill(selector, value)).await
    }

    pub async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<(), TestError> {
        self.guard("wait", self.browser.wait_for(selector, timeout_ms)).await
    }

    pub async fn query(&self, selector: &str) -> Result<ElementState, TestError> {
        self.guard("query", self.browser.query(selector)).await
    }

    pub async fn current_url(&self) -> Result<String, TestError> {
        self.guard("url", self.browser.current_url()).await
    }

    pub async fn store_value(&self, key: &str) -> Result<Option<serde_json::Value>, TestError> {
        self.guard("store", self.browser.store_value(key)).await
    }

    pub async fn screenshot(&self, request: &ScreenshotRequest) -> Result<ScreenshotResult, TestError> {
        self.guard("screenshot", self.browser.screenshot(request)).await
    }
}

/// What a test body receives.
#[derive(Clone)]
pub struct TestContext {
    test_name: Arc<str>,
    page: Page,
    assertions: Assertions,
    skip: Arc<AtomicBool>,
    timeout: Arc<watch::Sender<Duration>>,
}

impl TestContext {
    pub(crate) fn new(
        test_name: &str,
        browser: SharedBrowser,
        cancel: CancellationToken,
        skip: Arc<AtomicBool>,
        timeout: watch::Sender<Duration>,
    ) -> Self {
        let page = Page::new(browser, cancel);
        Self {
            test_name: Arc::from(test_name),
            assertions: Assertions::new(page.clone()),
            page,
            skip,
            timeout: Arc::new(timeout),
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Assertion API bound to this run
    pub fn expect(&self) -> &Assertions {
        &self.assertions
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Cancelled when the test times out; hand it to any task the body spawns.
    pub fn cancellation(&self) -> CancellationToken {
        self.page.cancel.clone()
    }

    /// Mark the test skipped and abort the body: `return ctx.skip();`
    pub fn skip(&self) -> Result<(), TestError> {
        self.skip.store(true, Ordering::SeqCst);
        Err(TestError::Skipped)
    }

    pub fn skip_if(&self, condition: bool) -> Result<(), TestError> {
        if condition {
            self.skip()
        } else {
            Ok(())
        }
    }

    /// Replace the timeout bound of the current run, measured from its start.
    pub fn timeout(&self, ms: u64) {
        self.timeout.send_replace(Duration::from_millis(ms));
    }

    pub fn current_timeout(&self) -> Duration {
        *self.timeout.borrow()
    }
}
