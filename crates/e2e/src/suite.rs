//! Test suites: ordered tests plus lifecycle hooks

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::SharedBrowser;
use crate::case::{boxed, catch_panics, TestCase};
use crate::context::TestContext;
use crate::error::{HookKind, TestError};
use crate::result::{SuiteResult, TestResult};

pub type HookFuture = BoxFuture<'static, Result<(), TestError>>;
pub type HookFn = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Options applied to every test of a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteOptions {
    /// Per-test timeout unless a test overrides it
    #[serde(rename = "timeout_ms", with = "crate::http::millis")]
    pub timeout: Duration,

    /// Extra attempts for a test that ends FAILED
    pub retries: u32,

    /// Run the beforeEach/test/afterEach cycles concurrently
    pub parallel: bool,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 0,
            parallel: false,
        }
    }
}

/// A beforeAll or afterAll hook failed; the suite produced no result.
#[derive(Error, Debug, Clone)]
#[error("Suite '{suite}' aborted: {source}")]
pub struct SuiteError {
    pub suite: String,
    pub source: TestError,
}

#[derive(Default)]
struct Hooks {
    before_all: Vec<HookFn>,
    after_all: Vec<HookFn>,
    before_each: Vec<HookFn>,
    after_each: Vec<HookFn>,
}

pub struct TestSuite {
    name: String,
    browser: SharedBrowser,
    options: SuiteOptions,
    tests: Vec<TestCase>,
    hooks: Hooks,
}

impl TestSuite {
    pub fn new(name: impl Into<String>, browser: SharedBrowser) -> Self {
        Self::with_options(name, browser, SuiteOptions::default())
    }

    pub fn with_options(name: impl Into<String>, browser: SharedBrowser, options: SuiteOptions) -> Self {
        Self {
            name: name.into(),
            browser,
            options,
            tests: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &SuiteOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(TestCase::name)
    }

    pub fn test<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        let timeout = self.options.timeout;
        self.test_with_timeout(name, timeout, f)
    }

    pub fn test_with_timeout<F, Fut>(&mut self, name: impl Into<String>, timeout: Duration, f: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        let case = TestCase::new(name, boxed(f), self.browser.clone(), timeout);
        self.tests.push(case);
        self
    }

    /// Register a test that is reported SKIPPED without running.
    pub fn skip<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        let case = TestCase::new(name, boxed(f), self.browser.clone(), self.options.timeout).skipped();
        self.tests.push(case);
        self
    }

    pub fn before_all<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        self.hooks.before_all.push(hook(f));
        self
    }

    pub fn after_all<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        self.hooks.after_all.push(hook(f));
        self
    }

    pub fn before_each<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        self.hooks.before_each.push(hook(f));
        self
    }

    pub fn after_each<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        self.hooks.after_each.push(hook(f));
        self
    }

    /// Run the suite.
    ///
    /// `filter` keeps only tests whose name contains it; the rest are left
    /// out of the result entirely. afterAll hooks run even when a beforeAll
    /// hook or the test phase fails. A failing beforeAll or afterAll hook
    /// aborts the suite with [`SuiteError`].
    pub async fn run(&mut self, filter: Option<&str>) -> Result<SuiteResult, SuiteError> {
        let start_time = Utc::now();
        let started = Instant::now();
        info!("Running suite '{}' ({} test(s))", self.name, self.tests.len());

        let setup = run_hooks(&self.hooks.before_all, HookKind::BeforeAll).await;

        let mut results = Vec::new();
        if setup.is_ok() {
            let selected: Vec<&mut TestCase> = self
                .tests
                .iter_mut()
                .filter(|t| filter.map_or(true, |f| t.name().contains(f)))
                .collect();
            debug!("{} test(s) selected", selected.len());

            let before_each = &self.hooks.before_each;
            let after_each = &self.hooks.after_each;
            let retries = self.options.retries;

            if self.options.parallel {
                // join_all yields results in input order, whatever the completion order
                let cycles = selected
                    .into_iter()
                    .map(|test| run_cycle(test, before_each, after_each, retries));
                results = join_all(cycles).await;
            } else {
                for test in selected {
                    results.push(run_cycle(test, before_each, after_each, retries).await);
                }
            }
        }

        let teardown = run_teardown(&self.hooks.after_all, &self.name).await;

        let error = match (setup, teardown) {
            (Err(setup_err), Err(teardown_err)) => {
                warn!("Suite '{}': {} (after {})", self.name, teardown_err, setup_err);
                Some(setup_err)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Some(e),
            (Ok(()), Ok(())) => None,
        };

        if let Some(source) = error {
            return Err(SuiteError { suite: self.name.clone(), source });
        }

        let result = SuiteResult::completed(&self.name, start_time, started.elapsed(), results);
        info!(
            "Suite '{}': {} passed, {} failed, {} skipped ({} ms)",
            result.name, result.summary.passed, result.summary.failed, result.summary.skipped, result.duration_ms
        );
        Ok(result)
    }
}

fn hook<F, Fut>(f: F) -> HookFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TestError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Run hooks one after another, stopping at the first failure.
async fn run_hooks(hooks: &[HookFn], kind: HookKind) -> Result<(), TestError> {
    for (i, hook) in hooks.iter().enumerate() {
        debug!("Running {} hook #{}", kind, i + 1);
        catch_panics(|| (**hook)()).await.map_err(|e| e.in_hook(kind))?;
    }
    Ok(())
}

/// Run every afterAll hook even after one fails; the first error wins.
async fn run_teardown(hooks: &[HookFn], suite: &str) -> Result<(), TestError> {
    let mut first = None;
    for (i, hook) in hooks.iter().enumerate() {
        debug!("Running {} hook #{}", HookKind::AfterAll, i + 1);
        if let Err(e) = catch_panics(|| (**hook)()).await {
            let e = e.in_hook(HookKind::AfterAll);
            if first.is_none() {
                first = Some(e);
            } else {
                warn!("Suite '{}': {}", suite, e);
            }
        }
    }
    first.map_or(Ok(()), Err)
}

/// beforeEach -> test -> afterEach, repeated while the test fails and retries remain.
async fn run_cycle(
    test: &mut TestCase,
    before_each: &[HookFn],
    after_each: &[HookFn],
    retries: u32,
) -> TestResult {
    if test.is_skipped() {
        return test.run().await;
    }

    let mut attempt = 0;
    loop {
        let mut result = match run_hooks(before_each, HookKind::BeforeEach).await {
            Ok(()) => test.run().await,
            Err(e) => test.fail_before_run(e),
        };

        // afterEach always runs; it can only turn a non-failure into a failure
        if let Err(e) = run_hooks(after_each, HookKind::AfterEach).await {
            if result.failed() {
                warn!("Test '{}': {} (test already failed)", test.name(), e);
            } else {
                result.fail_with(&e);
            }
        }

        if result.failed() && attempt < retries {
            attempt += 1;
            warn!("Test '{}' failed, retrying ({}/{})", test.name(), attempt, retries);
            continue;
        }

        result.retries = attempt;
        return result;
    }
}
