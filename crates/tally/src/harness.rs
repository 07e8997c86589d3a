//! Harness - runs suites as they are declared
//!
//! `Harness::suite` calls the suite body to collect tests and hooks, then runs
//! them straight away. Tests run one at a time, in registration order. Each
//! body runs on its own thread and races a timer on the harness's tokio
//! runtime; the first to settle decides the outcome.
//!
//! A body that loses the race is not stopped. Rust threads cannot be killed,
//! so the body keeps running in the background until it returns. Its context
//! is detached the moment the timer wins. After that its assertions are not
//! counted, mock changes made through its context are ignored, mock calls made
//! on its thread are not recorded, and its result is dropped.
//!
//! Detaching cannot reach anything else. Threads the body spawned itself still
//! record mock calls, and state the body shares through its own captures
//! (atomics, files, sockets) is still changed.
//!
//! When a hook fails, the tests of that suite that have not run yet are
//! reported as skipped, so the printed counts always add up to the number of
//! registered tests.

use crate::config::HarnessConfig;
use crate::context::TestContext;
use crate::error::{panic_message, Failure, TestError, TestResult};
use crate::reporter::{Reporter, RunSummary};
use crate::state::{Hook, HookKind, SuiteBuilder, SuiteOptions, SuiteState, TestBody, TestCase, Totals};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Owns the whole run: suite state, counters, failures, mocks and output
pub struct Harness {
    state: SuiteState,
    context: TestContext,
    reporter: Reporter,
    runtime: Runtime,
}

impl Harness {
    /// Create a harness reporting to stdout
    pub fn new(config: HarnessConfig) -> Result<Self, TestError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(Self {
            state: SuiteState::new(config.default_timeout),
            context: TestContext::new(),
            reporter: Reporter::new(&config),
            runtime,
        })
    }

    /// Send progress markers and the summary somewhere other than stdout
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.reporter = self.reporter.with_output(out);
        self
    }

    /// The run-wide context; hand it to code that mocks outside a test
    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn totals(&self) -> Totals {
        self.state.totals
    }

    pub fn assertions(&self) -> u64 {
        self.context.assertions()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.state.failures
    }

    /// Declare and immediately run a suite
    pub fn suite<F>(&mut self, name: &str, body: F)
    where
        F: FnOnce(&mut SuiteBuilder<'_>),
    {
        self.suite_with(name, SuiteOptions::default(), body);
    }

    /// Declare a suite whose tests are all reported as skipped
    pub fn xsuite<F>(&mut self, name: &str, body: F)
    where
        F: FnOnce(&mut SuiteBuilder<'_>),
    {
        self.suite_with(name, SuiteOptions::skipped(), body);
    }

    pub fn suite_with<F>(&mut self, name: &str, options: SuiteOptions, body: F)
    where
        F: FnOnce(&mut SuiteBuilder<'_>),
    {
        self.state.current_suite = name.to_string();
        body(&mut SuiteBuilder::new(&mut self.state));

        let tests = std::mem::take(&mut self.state.pending);
        let mut hooks = std::mem::take(&mut self.state.hooks);
        debug!(
            suite = name,
            tests = tests.len(),
            skip = options.skip,
            "suite started"
        );

        if !tests.is_empty() {
            let prepared = !options.skip
                && self.run_hook(&mut hooks.before_all, HookKind::BeforeAll, None);
            let mut aborted = !options.skip && !prepared;
            let mut not_run = 0usize;

            for case in tests {
                if aborted {
                    not_run += 1;
                }
                if options.skip || case.skip || aborted {
                    self.skip(&case.description);
                    continue;
                }
                let description = case.description.clone();
                if !self.run_hook(&mut hooks.before_each, HookKind::BeforeEach, Some(&description)) {
                    aborted = true;
                    not_run += 1;
                    self.skip(&description);
                    continue;
                }
                self.run_case(case);
                if !self.run_hook(&mut hooks.after_each, HookKind::AfterEach, Some(&description)) {
                    aborted = true;
                }
            }

            if not_run > 0 {
                warn!(
                    suite = name,
                    not_run,
                    "suite aborted by a failing hook, remaining tests reported as skipped"
                );
            }
            if prepared {
                self.run_hook(&mut hooks.after_all, HookKind::AfterAll, None);
            }
        }

        debug!(
            suite = name,
            failures = self.state.failures.len(),
            "suite finished"
        );
        self.state.reset();
    }

    /// Print the summary and hand back the final counts
    pub fn terminate(mut self) -> RunSummary {
        let summary = RunSummary {
            passed: self.state.totals.tests_run,
            assertions: self.context.assertions(),
            skipped: self.state.totals.skipped,
            total_duration: self.state.totals.total_duration,
            failures: std::mem::take(&mut self.state.failures),
        };
        if let Err(err) = self.reporter.summary(&summary) {
            warn!(error = %err, "could not write test summary");
        }
        summary
    }

    fn run_case(&mut self, case: TestCase) {
        let ctx = self.context.scoped();
        let started = Instant::now();

        match self.race(case.body, &ctx, case.timeout, &case.description) {
            Ok(()) => {
                let elapsed = started.elapsed();
                self.state.totals.tests_run += 1;
                self.state.totals.total_duration += elapsed;
                let suite = self.state.current_suite.clone();
                self.reporter.test_passed(&suite, &case.description, elapsed);
            }
            Err(err) => self.fail(&case.description, &err),
        }
    }

    /// Race `body` against `timeout`. Tests never overlap: this returns only
    /// once the race has settled.
    fn race(
        &self,
        body: TestBody,
        ctx: &TestContext,
        timeout: Duration,
        description: &str,
    ) -> TestResult {
        let (tx, rx) = oneshot::channel::<TestResult>();
        let body_ctx = ctx.clone();
        thread::Builder::new()
            .name("tally-test".to_string())
            .spawn(move || {
                body_ctx.bind_to_current_thread();
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body(&body_ctx))) {
                    Ok(result) => result,
                    Err(payload) => Err(TestError::Panicked(panic_message(payload.as_ref()))),
                };
                // Nobody is listening any more if the timer won.
                let _ = tx.send(outcome);
            })?;

        self.runtime.block_on(async {
            tokio::select! {
                settled = rx => settled.unwrap_or_else(|_| {
                    Err(TestError::msg("test body exited without reporting a result"))
                }),
                _ = tokio::time::sleep(timeout) => {
                    ctx.detach();
                    warn!(
                        suite = %self.state.current_suite,
                        test = description,
                        timeout_ms = timeout.as_millis() as u64,
                        "test timed out, its body keeps running detached"
                    );
                    Err(TestError::Timeout { after: timeout })
                }
            }
        })
    }

    /// Run a hook on the harness thread. Returns false if it failed, after
    /// recording the failure.
    fn run_hook(&mut self, hook: &mut Option<Hook>, kind: HookKind, test: Option<&str>) -> bool {
        let Some(hook) = hook.as_mut() else {
            return true;
        };
        let ctx = self.context.clone();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| hook(&ctx))) {
            Ok(result) => result,
            Err(payload) => Err(TestError::Panicked(panic_message(payload.as_ref()))),
        };
        match outcome {
            Ok(()) => true,
            Err(err) => {
                let label = match test {
                    Some(test) => format!("{} hook for \"{}\"", kind, test),
                    None => format!("{} hook", kind),
                };
                error!(
                    suite = %self.state.current_suite,
                    hook = %kind,
                    error = %err,
                    "hook failed, skipping the rest of the suite"
                );
                self.fail(&label, &err);
                false
            }
        }
    }

    fn skip(&mut self, test: &str) {
        self.state.totals.skipped += 1;
        let suite = self.state.current_suite.clone();
        self.reporter.test_skipped(&suite, test);
    }

    fn fail(&mut self, test: &str, err: &TestError) {
        let suite = self.state.current_suite.clone();
        self.state
            .failures
            .push(Failure::from_error(&suite, test, err));
        self.reporter.test_failed(&suite, test, err);
    }
}
