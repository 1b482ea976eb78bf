//! Declarative YAML suite specification

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::assertions::Assertions;
use crate::browser::{ScreenshotRequest, SharedBrowser};
use crate::context::{Page, TestContext};
use crate::error::{E2eError, E2eResult, TestError};
use crate::suite::{HookFuture, SuiteOptions, TestSuite};

/// A suite parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Suite name shown in reports
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Per-test timeout; the runner default applies when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub retries: u32,

    #[serde(default)]
    pub parallel: bool,

    #[serde(default)]
    pub before_all: Vec<Step>,

    #[serde(default)]
    pub after_all: Vec<Step>,

    #[serde(default)]
    pub before_each: Vec<Step>,

    #[serde(default)]
    pub after_each: Vec<Step>,

    pub tests: Vec<TestSpec>,
}

/// A single test inside a suite spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    pub name: String,

    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    pub steps: Vec<Step>,
}

/// A single step in a test or hook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to the app root)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
    },

    /// Fill an input field
    Fill {
        selector: String,
        value: String,
    },

    /// Wait for an element to appear
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Take a screenshot, optionally checking the result
    Screenshot {
        name: String,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        full_page: bool,
        #[serde(default)]
        min_bytes: Option<u64>,
        #[serde(default)]
        path_contains: Option<String>,
    },

    /// Assert something about the page; every given check must hold
    Assert(AssertStep),

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000 // 5 seconds default
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssertStep {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub exists: Option<bool>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub text_contains: Option<String>,
    #[serde(default)]
    pub attribute: Option<AttributeAssertion>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_contains: Option<String>,
    #[serde(default)]
    pub store: Option<StoreAssertion>,
    /// Replaces the generated failure message
    #[serde(default)]
    pub message: Option<String>,
}

impl AssertStep {
    fn needs_selector(&self) -> bool {
        self.exists.is_some()
            || self.visible.is_some()
            || self.enabled.is_some()
            || self.count.is_some()
            || self.text.is_some()
            || self.text_contains.is_some()
            || self.attribute.is_some()
    }

    fn is_empty(&self) -> bool {
        !self.needs_selector() && self.url.is_none() && self.url_contains.is_none() && self.store.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreAssertion {
    pub key: String,
    pub value: serde_json::Value,
}

impl SuiteSpec {
    /// Parse a suite spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a suite spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suite specs from a directory, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        info!("Loaded {} suite spec(s) from {}", specs.len(), dir.display());
        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("suite name must not be empty".into()));
        }
        let hooks = [&self.before_all, &self.after_all, &self.before_each, &self.after_each];
        for step in hooks.into_iter().flatten() {
            validate_step(&self.name, step)?;
        }
        for test in &self.tests {
            if test.name.trim().is_empty() {
                return Err(E2eError::SpecParse(format!("suite '{}': test name must not be empty", self.name)));
            }
            for step in &test.steps {
                validate_step(&test.name, step)?;
            }
        }
        Ok(())
    }

    /// Compile into a runnable suite bound to `browser`
    pub fn into_suite(self, browser: SharedBrowser, default_timeout: Duration) -> TestSuite {
        let options = SuiteOptions {
            timeout: self.timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout),
            retries: self.retries,
            parallel: self.parallel,
        };
        let suite_timeout = options.timeout;
        let mut suite = TestSuite::with_options(self.name, browser.clone(), options);

        // Hooks get their own page; only test runs carry a timeout token
        let hook_page = Page::new(browser, CancellationToken::new());
        if !self.before_all.is_empty() {
            suite.before_all(step_hook(hook_page.clone(), self.before_all));
        }
        if !self.after_all.is_empty() {
            suite.after_all(step_hook(hook_page.clone(), self.after_all));
        }
        if !self.before_each.is_empty() {
            suite.before_each(step_hook(hook_page.clone(), self.before_each));
        }
        if !self.after_each.is_empty() {
            suite.after_each(step_hook(hook_page, self.after_each));
        }

        for test in self.tests {
            let steps = Arc::new(test.steps);
            let body = move |ctx: TestContext| {
                let steps = steps.clone();
                async move { run_steps(ctx.page(), &steps).await }
            };
            let timeout = test.timeout_ms.map(Duration::from_millis).unwrap_or(suite_timeout);
            if test.skip {
                suite.skip(test.name, body);
            } else {
                suite.test_with_timeout(test.name, timeout, body);
            }
        }

        suite
    }
}

fn step_hook(page: Page, steps: Vec<Step>) -> impl Fn() -> HookFuture + Send + Sync + 'static {
    let steps = Arc::new(steps);
    move || {
        let steps = steps.clone();
        let page = page.clone();
        async move { run_steps(&page, &steps).await }.boxed()
    }
}

fn validate_step(owner: &str, step: &Step) -> E2eResult<()> {
    if let Step::Assert(check) = step {
        if check.is_empty() {
            return Err(E2eError::SpecParse(format!("'{}': assert step has no checks", owner)));
        }
        if check.needs_selector() && check.selector.is_none() {
            return Err(E2eError::SpecParse(format!("'{}': element assertion requires a selector", owner)));
        }
    }
    Ok(())
}

/// Execute steps in order, stopping at the first failure
pub async fn run_steps(page: &Page, steps: &[Step]) -> Result<(), TestError> {
    for step in steps {
        run_step(page, step).await?;
    }
    Ok(())
}

async fn run_step(page: &Page, step: &Step) -> Result<(), TestError> {
    match step {
        Step::Navigate { url, wait_for_selector } => {
            page.navigate(url).await?;
            if let Some(selector) = wait_for_selector {
                page.wait_for(selector, default_wait_timeout()).await?;
            }
        }
        Step::Click { selector } => page.click(selector).await?,
        Step::Fill { selector, value } => page.fill(selector, value).await?,
        Step::Wait { selector, timeout_ms } => page.wait_for(selector, *timeout_ms).await?,
        Step::Sleep { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        Step::Log { message } => info!("[TEST LOG] {}", message),
        Step::Screenshot { name, selector, full_page, min_bytes, path_contains } => {
            let request = ScreenshotRequest {
                name: name.clone(),
                selector: selector.clone(),
                full_page: *full_page,
            };
            let shot = page.screenshot(&request).await?;
            let expect = Assertions::new(page.clone());
            expect.screenshot_captured(&shot)?;
            if let Some(min) = min_bytes {
                expect.screenshot_size(&shot, *min)?;
            }
            if let Some(fragment) = path_contains {
                expect.screenshot_path(&shot, fragment)?;
            }
        }
        Step::Assert(check) => run_assert(page, check).await?,
    }
    Ok(())
}

async fn run_assert(page: &Page, check: &AssertStep) -> Result<(), TestError> {
    let base = Assertions::new(page.clone());
    let expect = match &check.message {
        Some(message) => base.with_message(message.clone()),
        None => base,
    };
    let selector = check.selector.as_deref().unwrap_or_default();

    match check.exists {
        Some(true) => expect.element_exists(selector).await?,
        Some(false) => expect.element_count(selector, 0).await?,
        None => {}
    }
    match check.visible {
        Some(true) => expect.element_visible(selector).await?,
        Some(false) => expect.element_hidden(selector).await?,
        None => {}
    }
    match check.enabled {
        Some(true) => expect.element_enabled(selector).await?,
        Some(false) => expect.element_disabled(selector).await?,
        None => {}
    }
    if let Some(count) = check.count {
        expect.element_count(selector, count).await?;
    }
    if let Some(text) = &check.text {
        expect.text_equals(selector, text).await?;
    }
    if let Some(fragment) = &check.text_contains {
        expect.text_contains(selector, fragment).await?;
    }
    if let Some(attr) = &check.attribute {
        expect.attribute_equals(selector, &attr.name, &attr.value).await?;
    }
    if let Some(url) = &check.url {
        expect.url_equals(url).await?;
    }
    if let Some(fragment) = &check.url_contains {
        expect.url_contains(fragment).await?;
    }
    if let Some(store) = &check.store {
        expect.store_equals(&store.key, &store.value).await?;
    }
    Ok(())
}
