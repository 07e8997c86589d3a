//! Harness configuration via environment variables
//!
//! There is no configuration file. Everything is read from `TALLY_*`
//! variables (plus the standard `NO_COLOR`) and can be overridden with the
//! builder methods.

use std::env;
use std::time::Duration;

/// Per-test timeout used when neither the test nor the environment sets one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Colourise markers and summary (off with TALLY_NO_COLOR=1 or NO_COLOR=1)
    pub color: bool,
    /// One line per test instead of single-character markers (TALLY_VERBOSE=1)
    pub verbose: bool,
    /// Timeout for tests that don't set their own (TALLY_TIMEOUT_MS=500)
    pub default_timeout: Duration,
}

impl HarnessConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            color: env::var("TALLY_NO_COLOR").is_err() && env::var("NO_COLOR").is_err(),
            verbose: env::var("TALLY_VERBOSE")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            default_timeout: env::var("TALLY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        }
    }

    /// Fixed configuration that ignores the environment: no colour, markers, 3s timeout
    pub fn plain() -> Self {
        Self {
            color: false,
            verbose: false,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_truthy(value: &str) -> bool {
    let lower = value.to_lowercase();
    !(lower.is_empty() || lower == "0" || lower == "false" || lower == "off")
}
