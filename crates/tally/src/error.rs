//! Errors raised by test bodies, hooks, assertions and mocks

use std::any::Any;
use std::panic::Location;
use std::time::Duration;
use thiserror::Error;

/// Everything that can make a test fail
#[derive(Error, Debug)]
pub enum TestError {
    /// An assertion primitive (or `assert_call`) saw a value it did not expect
    #[error("assertion failed ({operator}): expected {expected}, actual {actual}")]
    AssertionMismatch {
        operator: &'static str,
        expected: String,
        actual: String,
        location: Option<&'static Location<'static>>,
    },

    #[error("module not mocked: {module}")]
    ModuleNotMocked { module: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("timeout: test did not settle within {} ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("{module} has no function named '{function}'")]
    UnknownFunction { module: String, function: String },

    /// Mock change attempted by a test body that already timed out
    #[error("test context was detached after a timeout")]
    Detached,

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for test bodies, hooks and mock functions
pub type TestResult<T = ()> = Result<T, TestError>;

impl TestError {
    /// Build an assertion mismatch pinned to the caller's source location
    #[track_caller]
    pub fn mismatch(
        operator: &'static str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        TestError::AssertionMismatch {
            operator,
            expected: expected.into(),
            actual: actual.into(),
            location: Some(Location::caller()),
        }
    }

    /// Free-form failure, for test bodies that want to bail out with a message
    pub fn msg(message: impl Into<String>) -> Self {
        TestError::Message(message.into())
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, TestError::AssertionMismatch { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TestError::Timeout { .. })
    }

    /// Multi-line trace shown under a failure in the summary
    pub fn stacktrace(&self) -> String {
        let mut trace = match self {
            TestError::AssertionMismatch { .. } => format!("AssertionError: {}", self),
            TestError::Other(err) => {
                // anyhow keeps the whole context chain, one cause per line
                let mut out = format!("Error: {}", err);
                for cause in err.chain().skip(1) {
                    out.push_str(&format!("\n  caused by: {}", cause));
                }
                out
            }
            other => format!("Error: {}", other),
        };
        if let TestError::AssertionMismatch {
            location: Some(loc),
            ..
        } = self
        {
            trace.push_str(&format!("\n    at {}:{}:{}", loc.file(), loc.line(), loc.column()));
        }
        trace
    }
}

/// Turn a caught panic payload into the message it was raised with
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One failed test, as it appears in the final summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub suite: String,
    pub test: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub stacktrace: String,
}

impl Failure {
    /// Record `error` against `suite`/`test`.
    ///
    /// Only assertion mismatches carry expected/actual; every other error is reduced
    /// to its trace.
    pub fn from_error(suite: &str, test: &str, error: &TestError) -> Self {
        let (expected, actual) = match error {
            TestError::AssertionMismatch {
                expected, actual, ..
            } => (Some(expected.clone()), Some(actual.clone())),
            _ => (None, None),
        };
        Self {
            suite: suite.to_string(),
            test: test.to_string(),
            expected,
            actual,
            stacktrace: error.stacktrace(),
        }
    }
}
