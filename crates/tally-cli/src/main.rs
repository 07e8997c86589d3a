use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tally::{Harness, HarnessConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod demos;

/// Run tally's built-in suites and report the outcome.
///
/// Prints one marker per test, then a summary. The exit status is the
/// number of failed tests.
///
/// EXAMPLES:
///     tally-selftest                      Run every demo suite
///     tally-selftest --suite mock         Only suites whose name contains "mock"
///     tally-selftest --include-failing    Add a suite that fails on purpose
///
/// ENVIRONMENT VARIABLES:
///     TALLY_VERBOSE     Set to '1' for one line per test
///     TALLY_TIMEOUT_MS  Default per-test timeout in milliseconds
///     NO_COLOR          Set to disable colored output
#[derive(Parser)]
#[command(name = "tally-selftest")]
#[command(version)]
struct Cli {
    /// Only run suites whose name contains this text
    #[arg(long, short = 's')]
    suite: Option<String>,
    /// Also run a suite whose tests fail on purpose
    #[arg(long)]
    include_failing: bool,
    /// Print one line per test instead of markers
    #[arg(long, short = 'v')]
    verbose: bool,
    /// Disable colored output
    #[arg(long)]
    no_color: bool,
    /// Default per-test timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Log harness internals to stderr
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --debug > warnings only
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = HarnessConfig::from_env();
    if cli.verbose {
        config = config.with_verbose(true);
    }
    if cli.no_color {
        config = config.with_color(false);
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_default_timeout(Duration::from_millis(ms));
    }

    let mut harness = Harness::new(config).context("failed to start the test harness")?;
    demos::run(
        &mut harness,
        &demos::Selection {
            filter: cli.suite,
            include_failing: cli.include_failing,
        },
    );

    harness.terminate().exit()
}
