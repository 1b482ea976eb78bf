//! Assertion API used by test bodies
//!
//! Element, text, attribute, URL and store checks round-trip to the
//! browser-control service through a [`Page`]; screenshot checks inspect a
//! [`ScreenshotResult`] the test already holds. Every check returns
//! `Err(TestError::Assertion)` on mismatch so a body can use `?`.

use std::fmt::Debug;

use crate::browser::{ElementState, ScreenshotResult};
use crate::context::Page;
use crate::error::TestError;

pub type AssertResult = Result<(), TestError>;

#[derive(Clone)]
pub struct Assertions {
    page: Page,
    message: Option<String>,
}

impl Assertions {
    pub fn new(page: Page) -> Self {
        Self { page, message: None }
    }

    /// Same checks, reporting `message` instead of the generated text on failure.
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            page: self.page.clone(),
            message: Some(message.into()),
        }
    }

    fn check(&self, ok: bool, default: impl FnOnce() -> String) -> AssertResult {
        if ok {
            return Ok(());
        }
        let message = match &self.message {
            Some(custom) => custom.clone(),
            None => default(),
        };
        Err(TestError::assertion(message))
    }

    async fn element(&self, selector: &str) -> Result<ElementState, TestError> {
        self.page.query(selector).await
    }

    pub fn is_true(&self, condition: bool, description: &str) -> AssertResult {
        self.check(condition, || format!("Expected {} to be true", description))
    }

    pub fn equals<T: PartialEq + Debug>(&self, actual: T, expected: T) -> AssertResult {
        let ok = actual == expected;
        self.check(ok, || format!("Expected {:?}, got {:?}", expected, actual))
    }

    pub async fn element_exists(&self, selector: &str) -> AssertResult {
        let state = self.element(selector).await?;
        self.check(state.exists(), || format!("Element '{}' does not exist", selector))
    }

    pub async fn element_visible(&self, selector: &str) -> AssertResult {
        let state = self.element(selector).await?;
        self.check(state.exists() && state.visible, || {
            format!("Element '{}' is not visible", selector)
        })
    }

    /// Passes for elements that are absent as well as present-but-hidden
    pub async fn element_hidden(&self, selector: &str) -> AssertResult {
        let state = self.element(selector).await?;
        self.check(!state.exists() || !state.visible, || {
            format!("Element '{}' is visible", selector)
        })
    }

    pub async fn element_enabled(&self, selector: &str) -> AssertResult {
        let state = self.element(selector).await?;
        if !state.exists() {
            return self.check(false, || format!("Element '{}' does not exist", selector));
        }
        self.check(state.enabled, || format!("Element '{}' is disabled", selector))
    }

    pub async fn element_disabled(&self, selector: &str) -> AssertResult {
        let state = self.element(selector).await?;
        if !state.exists() {
            return self.check(false, || format!("Element '{}' does not exist", selector));
        }
        self.check(!state.enabled, || format!("Element '{}' is enabled", selector))
    }

    pub async fn element_count(&self, selector: &str, expected: usize) -> AssertResult {
        let state = self.element(selector).await?;
        self.check(state.count == expected, || {
            format!(
                "Expected {} element(s) matching '{}', found {}",
                expected, selector, state.count
            )
        })
    }

    pub async fn text_contains(&self, selector: &str, substring: &str) -> AssertResult {
        let state = self.element(selector).await?;
        let text = state.text.unwrap_or_default();
        self.check(text.contains(substring), || {
            format!("Text of '{}' does not contain '{}' (was '{}')", selector, substring, text)
        })
    }

    pub async fn text_equals(&self, selector: &str, expected: &str) -> AssertResult {
        let state = self.element(selector).await?;
        let text = state.text.unwrap_or_default();
        self.check(text.trim() == expected, || {
            format!("Text of '{}' is '{}', expected '{}'", selector, text.trim(), expected)
        })
    }

    pub async fn attribute_equals(&self, selector: &str, attribute: &str, expected: &str) -> AssertResult {
        let state = self.element(selector).await?;
        let actual = state.attributes.get(attribute);
        self.check(actual.map(String::as_str) == Some(expected), || match actual {
            Some(value) => format!(
                "Attribute '{}' of '{}' is '{}', expected '{}'",
                attribute, selector, value, expected
            ),
            None => format!("Element '{}' has no attribute '{}'", selector, attribute),
        })
    }

    pub async fn url_equals(&self, expected: &str) -> AssertResult {
        let url = self.page.current_url().await?;
        self.check(url == expected, || format!("URL is '{}', expected '{}'", url, expected))
    }

    pub async fn url_contains(&self, fragment: &str) -> AssertResult {
        let url = self.page.current_url().await?;
        self.check(url.contains(fragment), || {
            format!("URL '{}' does not contain '{}'", url, fragment)
        })
    }

    /// Compare a value from the application's client-side store
    pub async fn store_equals(&self, key: &str, expected: &serde_json::Value) -> AssertResult {
        let actual = self.page.store_value(key).await?;
        self.check(actual.as_ref() == Some(expected), || match &actual {
            Some(value) => format!("Store key '{}' is {}, expected {}", key, value, expected),
            None => format!("Store key '{}' is not set", key),
        })
    }

    pub fn screenshot_captured(&self, result: &ScreenshotResult) -> AssertResult {
        self.check(result.success && result.path.is_some(), || match &result.error {
            Some(err) => format!("Screenshot was not captured: {}", err),
            None => "Screenshot was not captured".to_string(),
        })
    }

    pub fn screenshot_size(&self, result: &ScreenshotResult, min_bytes: u64) -> AssertResult {
        self.screenshot_captured(result)?;
        self.check(result.size >= min_bytes, || {
            format!("Screenshot is {} bytes, expected at least {}", result.size, min_bytes)
        })
    }

    pub fn screenshot_path(&self, result: &ScreenshotResult, expected: &str) -> AssertResult {
        self.screenshot_captured(result)?;
        let path = result
            .path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.check(path.contains(expected), || {
            format!("Screenshot path '{}' does not contain '{}'", path, expected)
        })
    }
}
