//! Suite state and the registration API
//!
//! A suite body receives a [`SuiteBuilder`] and uses it to register tests and
//! hooks. The registrations land in [`SuiteState`], which only ever describes
//! the one suite being built; the harness drains it, runs the suite, and
//! resets it before the next suite starts.

use crate::context::TestContext;
use crate::error::{Failure, TestResult};
use std::fmt;
use std::time::Duration;

/// A test body. Runs on its own thread, at most once.
pub type TestBody = Box<dyn FnOnce(&TestContext) -> TestResult + Send + 'static>;

/// A lifecycle hook. Runs on the harness thread.
pub type Hook = Box<dyn FnMut(&TestContext) -> TestResult + 'static>;

/// Options for a single test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestOptions {
    pub skip: bool,
    /// Falls back to the harness default when unset
    pub timeout: Option<Duration>,
}

impl TestOptions {
    pub fn skipped() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// Options for a whole suite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteOptions {
    pub skip: bool,
}

impl SuiteOptions {
    pub fn skipped() -> Self {
        Self { skip: true }
    }
}

/// A registered test, consumed when its suite runs
pub struct TestCase {
    pub description: String,
    pub(crate) body: TestBody,
    pub skip: bool,
    pub timeout: Duration,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("description", &self.description)
            .field("skip", &self.skip)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::AfterAll => "afterAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
        })
    }
}

/// The four hook slots of a suite; an empty slot is a no-op
#[derive(Default)]
pub(crate) struct Hooks {
    pub before_all: Option<Hook>,
    pub after_all: Option<Hook>,
    pub before_each: Option<Hook>,
    pub after_each: Option<Hook>,
}

impl Hooks {
    fn slot(&mut self, kind: HookKind) -> &mut Option<Hook> {
        match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::AfterAll => &mut self.after_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
        }
    }
}

/// Counters that only ever grow during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Tests whose body finished without error in time
    pub tests_run: u64,
    pub skipped: u64,
    /// Sum of the passing tests' durations
    pub total_duration: Duration,
}

/// Everything the harness tracks between and during suites
pub(crate) struct SuiteState {
    pub current_suite: String,
    pub pending: Vec<TestCase>,
    pub hooks: Hooks,
    pub totals: Totals,
    pub failures: Vec<Failure>,
    pub default_timeout: Duration,
}

impl SuiteState {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            current_suite: String::new(),
            pending: Vec::new(),
            hooks: Hooks::default(),
            totals: Totals::default(),
            failures: Vec::new(),
            default_timeout,
        }
    }

    pub fn add_test(&mut self, description: String, body: TestBody, options: TestOptions) {
        self.pending.push(TestCase {
            description,
            body,
            skip: options.skip,
            timeout: options.timeout.unwrap_or(self.default_timeout),
        });
    }

    /// Last registration wins
    pub fn set_hook(&mut self, kind: HookKind, hook: Hook) {
        *self.hooks.slot(kind) = Some(hook);
    }

    /// Forget everything about the suite that just ran
    pub fn reset(&mut self) {
        self.current_suite.clear();
        self.pending.clear();
        self.hooks = Hooks::default();
    }
}

/// Registration handle passed to a suite body
pub struct SuiteBuilder<'a> {
    state: &'a mut SuiteState,
}

impl<'a> SuiteBuilder<'a> {
    pub(crate) fn new(state: &'a mut SuiteState) -> Self {
        Self { state }
    }

    /// Name of the suite being declared
    pub fn suite_name(&self) -> &str {
        &self.state.current_suite
    }

    pub fn test<F>(&mut self, description: impl Into<String>, body: F)
    where
        F: FnOnce(&TestContext) -> TestResult + Send + 'static,
    {
        self.test_with(description, TestOptions::default(), body);
    }

    pub fn test_with<F>(&mut self, description: impl Into<String>, options: TestOptions, body: F)
    where
        F: FnOnce(&TestContext) -> TestResult + Send + 'static,
    {
        self.state
            .add_test(description.into(), Box::new(body), options);
    }

    /// Register a test that is reported as skipped and never run
    pub fn xtest<F>(&mut self, description: impl Into<String>, body: F)
    where
        F: FnOnce(&TestContext) -> TestResult + Send + 'static,
    {
        self.test_with(description, TestOptions::skipped(), body);
    }

    pub fn before_all<F>(&mut self, hook: F)
    where
        F: FnMut(&TestContext) -> TestResult + 'static,
    {
        self.state.set_hook(HookKind::BeforeAll, Box::new(hook));
    }

    pub fn after_all<F>(&mut self, hook: F)
    where
        F: FnMut(&TestContext) -> TestResult + 'static,
    {
        self.state.set_hook(HookKind::AfterAll, Box::new(hook));
    }

    pub fn before_each<F>(&mut self, hook: F)
    where
        F: FnMut(&TestContext) -> TestResult + 'static,
    {
        self.state.set_hook(HookKind::BeforeEach, Box::new(hook));
    }

    pub fn after_each<F>(&mut self, hook: F)
    where
        F: FnMut(&TestContext) -> TestResult + 'static,
    {
        self.state.set_hook(HookKind::AfterEach, Box::new(hook));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn state() -> SuiteState {
        SuiteState::new(Duration::from_millis(3000))
    }

    #[test]
    fn test_registration_keeps_order_and_options() {
        let mut state = state();
        {
            let mut builder = SuiteBuilder::new(&mut state);
            builder.test("first", |_| Ok(()));
            builder.xtest("second", |_| Ok(()));
            builder.test_with(
                "third",
                TestOptions::with_timeout(Duration::from_millis(5)),
                |_| Ok(()),
            );
        }

        let described: Vec<_> = state
            .pending
            .iter()
            .map(|t| (t.description.as_str(), t.skip, t.timeout.as_millis()))
            .collect();
        assert_eq!(
            described,
            vec![("first", false, 3000), ("second", true, 3000), ("third", false, 5)]
        );
    }

    #[test]
    fn test_last_hook_registration_wins() {
        let mut state = state();
        let calls = Rc::new(Cell::new(0));
        {
            let mut builder = SuiteBuilder::new(&mut state);
            let first = Rc::clone(&calls);
            builder.before_each(move |_| {
                first.set(first.get() + 1);
                Ok(())
            });
            let second = Rc::clone(&calls);
            builder.before_each(move |_| {
                second.set(second.get() + 10);
                Ok(())
            });
        }

        let hook = state.hooks.before_each.as_mut().unwrap();
        hook(&TestContext::new()).unwrap();
        assert_eq!(calls.get(), 10);
    }

    #[test]
    fn test_reset_clears_suite_but_keeps_totals() {
        let mut state = state();
        state.current_suite = "suite".to_string();
        state.totals.tests_run = 4;
        SuiteBuilder::new(&mut state).test("t", |_| Ok(()));
        SuiteBuilder::new(&mut state).after_all(|_| Ok(()));

        state.reset();

        assert!(state.current_suite.is_empty());
        assert!(state.pending.is_empty());
        assert!(state.hooks.after_all.is_none());
        assert_eq!(state.totals.tests_run, 4);
    }

    #[test]
    fn test_hook_kind_names() {
        assert_eq!(HookKind::BeforeAll.to_string(), "beforeAll");
        assert_eq!(HookKind::AfterEach.to_string(), "afterEach");
    }
}
