//! Tally - suites, hooks, assertions and function mocks
//!
//! A [`Harness`] owns a test run. Each call to [`Harness::suite`] declares a
//! suite (tests plus `before_all`/`after_all`/`before_each`/`after_each`
//! hooks) and runs it right away. Every test body races its own timeout.
//! [`Harness::terminate`] prints the summary and returns a [`RunSummary`] whose
//! exit status is the number of failures.
//!
//! Test bodies and hooks receive a [`TestContext`]. It counts assertions and
//! gives access to the [`MockRegistry`].
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tally::{Harness, HarnessConfig, Mockable, PASSTHROUGH};
//!
//! let calc = Mockable::new("calc").with_function("add", |_, args| {
//!     Ok(json!(args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0)))
//! });
//!
//! let mut harness = Harness::new(HarnessConfig::plain()).unwrap();
//! harness.suite("arithmetic", |s| {
//!     s.test("adds", |t| t.assert_equal(1 + 1, 2));
//!
//!     let calc = calc.clone();
//!     s.test("records calls", move |t| {
//!         t.mock().new_mock(&calc);
//!         t.mock().expect(&calc, "add", PASSTHROUGH)?;
//!         t.assert_equal(calc.call("add", &[json!(2), json!(3)])?, json!(5))?;
//!         t.assert_call(&calc, "add", 1)?;
//!         t.mock().unload(&calc);
//!         Ok(())
//!     });
//! });
//!
//! let summary = harness.terminate();
//! assert!(summary.is_success());
//! assert_eq!(summary.assertions, 3);
//! ```

pub mod assertions;
pub mod config;
pub mod context;
pub mod error;
pub mod harness;
pub mod mock;
pub mod reporter;
pub mod state;

pub use assertions::ErrorMatcher;
pub use config::{HarnessConfig, DEFAULT_TIMEOUT};
pub use context::TestContext;
pub use error::{Failure, TestError, TestResult};
pub use harness::Harness;
pub use mock::{CallExpectation, MockFn, MockRegistry, Mockable, Replacement, PASSTHROUGH};
pub use reporter::{Reporter, RunSummary};
pub use state::{HookKind, SuiteBuilder, SuiteOptions, TestOptions, Totals};
