//! A single named test and its timeout race

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::browser::SharedBrowser;
use crate::context::TestContext;
use crate::error::{panic_message, TestError};
use crate::result::{TestResult, TestStatus};

pub type TestFuture = BoxFuture<'static, Result<(), TestError>>;

/// Boxed test body. Built by [`crate::TestSuite::test`] from any
/// `Fn(TestContext) -> impl Future<Output = Result<(), TestError>>`.
pub type TestFn = Arc<dyn Fn(TestContext) -> TestFuture + Send + Sync>;

pub(crate) fn boxed<F, Fut>(f: F) -> TestFn
where
    F: Fn(TestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TestError>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Build a future and drive it, turning panics at either stage into
/// [`TestError::Panicked`].
pub(crate) async fn catch_panics<Fut>(make: impl FnOnce() -> Fut) -> Result<(), TestError>
where
    Fut: Future<Output = Result<(), TestError>>,
{
    let fut = std::panic::catch_unwind(AssertUnwindSafe(make))
        .map_err(|p| TestError::Panicked(panic_message(p)))?;
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|p| Err(TestError::Panicked(panic_message(p))))
}

pub struct TestCase {
    name: String,
    body: TestFn,
    browser: SharedBrowser,
    timeout: Duration,
    skip: Arc<AtomicBool>,
    status: TestStatus,
}

impl TestCase {
    pub fn new(name: impl Into<String>, body: TestFn, browser: SharedBrowser, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            body,
            browser,
            timeout,
            skip: Arc::new(AtomicBool::new(false)),
            status: TestStatus::Pending,
        }
    }

    /// Declare the test skipped; `run` will not invoke the body.
    pub fn skipped(self) -> Self {
        self.skip.store(true, Ordering::SeqCst);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_skipped(&self) -> bool {
        self.skip.load(Ordering::SeqCst)
    }

    /// Run the body to a terminal status.
    ///
    /// The body races a timer armed with the test's timeout, re-armed whenever
    /// the body calls [`TestContext::timeout`]. If the timer wins, the run's
    /// cancellation token fires and the body future is dropped, which aborts
    /// any browser request still in flight.
    pub async fn run(&mut self) -> TestResult {
        let mut result = TestResult::pending(&self.name);
        let started = Instant::now();

        if self.is_skipped() {
            result.finish(started.elapsed(), Err(TestError::Skipped));
            self.status = result.status;
            return result;
        }

        self.status = TestStatus::Running;
        result.status = TestStatus::Running;
        debug!("Running test: {}", self.name);

        let (timeout_tx, timeout_rx) = watch::channel(self.timeout);
        let cancel = CancellationToken::new();
        // ctx.skip() sets the case's own flag, so later runs short-circuit
        let ctx = TestContext::new(
            &self.name,
            self.browser.clone(),
            cancel.clone(),
            self.skip.clone(),
            timeout_tx,
        );

        let body = self.body.clone();
        let outcome = race_timeout(
            &self.name,
            catch_panics(move || (*body)(ctx)),
            timeout_rx,
            started,
            &cancel,
        )
        .await;

        // A body that calls skip() but swallows the error is still skipped
        let outcome = match outcome {
            Ok(()) if self.is_skipped() => Err(TestError::Skipped),
            other => other,
        };

        result.finish(started.elapsed(), outcome);
        self.status = result.status;
        debug!("{} -> {} ({} ms)", self.name, result.status, result.duration_ms);
        result
    }

    /// Record a failure without invoking the body (e.g. its beforeEach failed).
    pub(crate) fn fail_before_run(&mut self, err: TestError) -> TestResult {
        let mut result = TestResult::pending(&self.name);
        result.finish(Duration::ZERO, Err(err));
        self.status = result.status;
        result
    }
}

async fn race_timeout(
    name: &str,
    body: impl Future<Output = Result<(), TestError>>,
    mut timeout_rx: watch::Receiver<Duration>,
    started: Instant,
    cancel: &CancellationToken,
) -> Result<(), TestError> {
    tokio::pin!(body);
    let mut bound = *timeout_rx.borrow_and_update();
    let mut overridable = true;

    loop {
        let deadline = started + bound;
        tokio::select! {
            biased;
            res = &mut body => return res,
            _ = tokio::time::sleep_until(deadline) => {
                cancel.cancel();
                return Err(TestError::Timeout {
                    test: name.to_string(),
                    timeout_ms: bound.as_millis() as u64,
                });
            }
            changed = timeout_rx.changed(), if overridable => {
                match changed {
                    Ok(()) => {
                        bound = *timeout_rx.borrow_and_update();
                        debug!("{}: timeout overridden to {} ms", name, bound.as_millis());
                    }
                    // Context dropped by the body; the bound can no longer change
                    Err(_) => overridable = false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserControl, ElementState, ScreenshotRequest, ScreenshotResult};
    use crate::error::E2eResult;
    use async_trait::async_trait;

    struct IdleBrowser;

    #[async_trait]
    impl BrowserControl for IdleBrowser {
        async fn navigate(&self, _url: &str) -> E2eResult<()> {
            Ok(())
        }
        async fn click(&self, _selector: &str) -> E2eResult<()> {
            Ok(())
        }
        async fn fill(&self, _selector: &str, _value: &str) -> E2eResult<()> {
            Ok(())
        }
        async fn wait_for(&self, _selector: &str, _timeout_ms: u64) -> E2eResult<()> {
            Ok(())
        }
        async fn query(&self, _selector: &str) -> E2eResult<ElementState> {
            // Never answers, like a hung browser session
            std::future::pending().await
        }
        async fn current_url(&self) -> E2eResult<String> {
            Ok("/".into())
        }
        async fn store_value(&self, _key: &str) -> E2eResult<Option<serde_json::Value>> {
            Ok(None)
        }
        async fn screenshot(&self, _request: &ScreenshotRequest) -> E2eResult<ScreenshotResult> {
            Ok(ScreenshotResult::default())
        }
    }

    fn case<F, Fut>(timeout_ms: u64, f: F) -> TestCase
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        TestCase::new("case", boxed(f), Arc::new(IdleBrowser), Duration::from_millis(timeout_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_before_timeout_passes() {
        let mut tc = case(100, |_ctx| async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok(())
        });
        assert_eq!(tc.status(), TestStatus::Pending);
        let result = tc.run().await;
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(tc.status(), TestStatus::Passed);
        assert_eq!(result.duration_ms, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_body_times_out() {
        let mut tc = case(50, |_ctx| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        });
        let result = tc.run().await;
        assert_eq!(result.status, TestStatus::Failed);
        let error = result.error.unwrap();
        assert_eq!(error.kind, "timeout");
        assert!(error.message.contains("50 ms"), "{}", error.message);
        assert_eq!(result.duration_ms, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_override_extends_bound() {
        let mut tc = case(50, |ctx| async move {
            ctx.timeout(300);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        });
        assert_eq!(tc.run().await.status, TestStatus::Passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_override_shortens_bound() {
        let mut tc = case(1_000, |ctx| async move {
            ctx.timeout(20);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        });
        let result = tc.run().await;
        assert!(result.error.unwrap().message.contains("20 ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_in_flight_browser_call() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        let mut tc = case(30, move |ctx| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(ctx.cancellation());
            }
            async move { ctx.expect().element_exists("#never").await }
        });
        let result = tc.run().await;
        assert_eq!(result.status, TestStatus::Failed);
        assert!(rx.await.unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_skip_call_yields_skipped() {
        let mut tc = case(1_000, |ctx| async move {
            ctx.skip()?;
            Err::<(), _>(TestError::failed("unreachable"))
        });
        let result = tc.run().await;
        assert_eq!(result.status, TestStatus::Skipped);
        assert!(result.error.is_none());
        // The flag sticks: the next run short-circuits without the body
        assert!(tc.is_skipped());
        let again = tc.run().await;
        assert_eq!(again.status, TestStatus::Skipped);
        assert_eq!(again.duration_ms, 0);
    }

    #[tokio::test]
    async fn test_swallowed_skip_still_skipped() {
        let mut tc = case(1_000, |ctx| async move {
            let _ = ctx.skip_if(true);
            Ok(())
        });
        assert_eq!(tc.run().await.status, TestStatus::Skipped);
    }

    #[tokio::test]
    async fn test_declared_skip_never_invokes_body() {
        let mut tc = case(1_000, |_ctx| async {
            if true {
                panic!("body must not run");
            }
            Ok(())
        })
        .skipped();
        let result = tc.run().await;
        assert_eq!(result.status, TestStatus::Skipped);
        assert_eq!(result.duration_ms, 0);
    }

    #[tokio::test]
    async fn test_panic_is_captured_as_failure() {
        let mut tc = case(1_000, |_ctx| async {
            if true {
                panic!("layout exploded");
            }
            Ok(())
        });
        let result = tc.run().await;
        assert_eq!(result.status, TestStatus::Failed);
        let error = result.error.unwrap();
        assert_eq!(error.kind, "panic");
        assert!(error.message.contains("layout exploded"));
    }

    #[tokio::test]
    async fn test_error_result_is_failure_with_message() {
        let mut tc = case(1_000, |_ctx| async { Err::<(), _>(TestError::assertion("title mismatch")) });
        let result = tc.run().await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.unwrap().message, "Assertion failed: title mismatch");
        assert_eq!(
            result.end_time.unwrap() - result.start_time,
            chrono::Duration::milliseconds(result.duration_ms as i64)
        );
    }
}
