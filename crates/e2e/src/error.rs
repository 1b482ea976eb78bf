//! Error types for E2E testing

use thiserror::Error;

/// Infrastructure errors: anything that is not the outcome of user test code.
#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Browser service failed to start: {0}")]
    ServiceStartup(String),

    #[error("Browser service health check failed after {0} attempts")]
    ServiceHealthCheck(usize),

    #[error("Browser service error: {0}")]
    Browser(String),

    #[error("Suite spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reporter '{reporter}' failed: {reason}")]
    Reporter { reporter: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Which lifecycle list a hook was registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::AfterAll => "afterAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of test code that did not complete normally.
///
/// `Skipped` is a signal rather than a failure; everything else ends a test
/// as `FAILED`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    #[error("Assertion failed: {message}")]
    Assertion { message: String },

    #[error("Test '{test}' timed out after {timeout_ms} ms")]
    Timeout { test: String, timeout_ms: u64 },

    #[error("Test skipped")]
    Skipped,

    #[error("{kind} hook failed: {message}")]
    Hook { kind: HookKind, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl TestError {
    pub fn assertion(message: impl Into<String>) -> Self {
        TestError::Assertion { message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        TestError::Failed(message.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, TestError::Skipped)
    }

    /// Short machine-readable kind used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            TestError::Assertion { .. } => "assertion",
            TestError::Timeout { .. } => "timeout",
            TestError::Skipped => "skip",
            TestError::Hook { .. } => "hook",
            TestError::Browser(_) => "browser",
            TestError::Cancelled(_) => "cancelled",
            TestError::Panicked(_) => "panic",
            TestError::Failed(_) => "error",
        }
    }

    /// Wrap an error raised by a hook, keeping an existing hook error as is.
    pub fn in_hook(self, kind: HookKind) -> Self {
        match self {
            TestError::Hook { .. } => self,
            other => TestError::Hook { kind, message: other.to_string() },
        }
    }
}

impl From<E2eError> for TestError {
    fn from(e: E2eError) -> Self {
        TestError::Browser(e.to_string())
    }
}

/// Render a caught panic payload as a message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_test_and_bound() {
        let err = TestError::Timeout { test: "loads dashboard".into(), timeout_ms: 1500 };
        let msg = err.to_string();
        assert!(msg.contains("loads dashboard"));
        assert!(msg.contains("1500 ms"));
    }

    #[test]
    fn test_in_hook_keeps_original_hook_error() {
        let err = TestError::Hook { kind: HookKind::BeforeEach, message: "boom".into() };
        assert_eq!(err.clone().in_hook(HookKind::AfterEach), err);

        let wrapped = TestError::failed("db down").in_hook(HookKind::AfterEach);
        assert_eq!(wrapped.to_string(), "afterEach hook failed: db down");
    }

    #[test]
    fn test_panic_message_downcasts() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "non-string panic payload");
    }
}
