//! CVKit E2E Test Framework
//!
//! Suites of async tests that check the resume builder's UI through an
//! external browser-control service:
//! - `TestCase` runs one body against a timeout that can be overridden mid-run
//! - `TestSuite` adds beforeAll/afterAll/beforeEach/afterEach hooks, name
//!   filtering, retries and an optional concurrent mode
//! - `TestRunner` sequences suites, fans results out to reporters and derives
//!   the process exit code
//! - `Assertions` checks elements, text, attributes, URLs, store state and
//!   screenshots
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  TestRunner                                                 │
//! │    ├── run_all() -> RunReport { suites, summary }           │
//! │    └── reporters: console | json | markdown                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSuite                                                  │
//! │    ├── before_all* → [before_each* → test → after_each*]*   │
//! │    │                 → after_all* (always)                  │
//! │    └── run(filter) -> SuiteResult                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestCase                                                   │
//! │    └── run() -> TestResult   (body ⟷ timer race)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestContext → Assertions → Page → BrowserControl (HTTP)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs as cooperative tasks; a parallel suite interleaves its
//! tests on one task and they share the same browser session.

pub mod assertions;
pub mod browser;
pub mod case;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod reporter;
pub mod result;
pub mod runner;
pub mod service;
pub mod spec;
pub mod suite;

pub use assertions::Assertions;
pub use browser::{BrowserControl, ElementState, ScreenshotRequest, ScreenshotResult, SharedBrowser};
pub use case::TestCase;
pub use config::{ReporterKind, RunnerConfig};
pub use context::{Page, TestContext};
pub use error::{E2eError, E2eResult, HookKind, TestError};
pub use result::{RunSummary, SuiteResult, SuiteSummary, TestFailure, TestResult, TestStatus};
pub use runner::{RunReport, SuiteAborted, TestRunner};
pub use spec::SuiteSpec;
pub use suite::{SuiteError, SuiteOptions, TestSuite};
