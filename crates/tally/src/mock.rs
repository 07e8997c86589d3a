//! Function mocks
//!
//! A [`Mockable`] is a named table of functions that callers dispatch through
//! with [`Mockable::call`]. Once a [`MockRegistry`] has attached a ledger to it
//! (`new_mock`), individual functions can be overridden with `expect`. Every call
//! to an overridden function is recorded, and the registry can later answer how
//! often (or with which arguments) it was called. `unload` puts the original
//! functions back.
//!
//! Arguments and return values are `serde_json::Value`s so that recorded calls
//! can be compared structurally.

use crate::context::{body_liveness, Liveness};
use crate::error::{TestError, TestResult};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Ledger ids are unique across every registry in the process
static NEXT_LEDGER: AtomicU64 = AtomicU64::new(0);

/// A function stored in a [`Mockable`]. The first argument is the table itself,
/// so functions can call their siblings (and see their overrides).
pub type MockFn = Arc<dyn Fn(&Mockable, &[Value]) -> TestResult<Value> + Send + Sync>;

/// Identifies the ledger a registry attached to a mockable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerId(u64);

struct MockableInner {
    name: String,
    functions: RwLock<HashMap<String, MockFn>>,
    ledger: Mutex<Option<LedgerId>>,
}

/// A named function table that can be mocked
///
/// Cloning is cheap and clones share the same table.
#[derive(Clone)]
pub struct Mockable {
    inner: Arc<MockableInner>,
}

impl Mockable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MockableInner {
                name: name.into(),
                functions: RwLock::new(HashMap::new()),
                ledger: Mutex::new(None),
            }),
        }
    }

    /// Builder form of [`Mockable::define`]
    pub fn with_function<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&Mockable, &[Value]) -> TestResult<Value> + Send + Sync + 'static,
    {
        self.define(name, f);
        self
    }

    /// Add or replace a function
    pub fn define<F>(&self, name: &str, f: F)
    where
        F: Fn(&Mockable, &[Value]) -> TestResult<Value> + Send + Sync + 'static,
    {
        self.inner
            .functions
            .write()
            .insert(name.to_string(), Arc::new(f));
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The function currently installed under `name`, override included
    pub fn function(&self, name: &str) -> Option<MockFn> {
        self.inner.functions.read().get(name).cloned()
    }

    /// Call `name` with `args`
    pub fn call(&self, name: &str, args: &[Value]) -> TestResult<Value> {
        // Clone out of the lock: the function may call back into this table.
        let f = self
            .function(name)
            .ok_or_else(|| TestError::UnknownFunction {
                module: self.inner.name.clone(),
                function: name.to_string(),
            })?;
        f(self, args)
    }

    fn swap(&self, name: &str, f: Option<MockFn>) -> Option<MockFn> {
        let mut functions = self.inner.functions.write();
        match f {
            Some(f) => functions.insert(name.to_string(), f),
            None => functions.remove(name),
        }
    }

    fn ledger_id(&self) -> Option<LedgerId> {
        *self.inner.ledger.lock()
    }
}

impl fmt::Debug for Mockable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.inner.functions.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("Mockable")
            .field("name", &self.inner.name)
            .field("functions", &names)
            .field("ledger", &self.ledger_id())
            .finish()
    }
}

/// What an overridden function does when called
#[derive(Clone)]
pub enum Replacement {
    /// Call this function instead
    Function(MockFn),
    /// Call the original function (the call is still recorded)
    Passthrough,
    /// Return this value without evaluating anything
    Value(Value),
}

/// Sentinel for `expect(.., PASSTHROUGH)`
pub const PASSTHROUGH: Replacement = Replacement::Passthrough;

impl Replacement {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Mockable, &[Value]) -> TestResult<Value> + Send + Sync + 'static,
    {
        Replacement::Function(Arc::new(f))
    }

    pub fn value(v: impl Into<Value>) -> Self {
        Replacement::Value(v.into())
    }
}

impl From<Value> for Replacement {
    fn from(v: Value) -> Self {
        Replacement::Value(v)
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Function(_) => f.write_str("Function(..)"),
            Replacement::Passthrough => f.write_str("Passthrough"),
            Replacement::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// What `assert_call` checks against the recorded calls
#[derive(Debug, Clone, PartialEq)]
pub enum CallExpectation {
    /// Exactly this many calls
    Count(usize),
    /// At least one call with exactly these arguments
    Args(Vec<Value>),
    /// Anything else; always rejected with `InvalidParameter`
    Invalid(Value),
}

impl From<usize> for CallExpectation {
    fn from(n: usize) -> Self {
        CallExpectation::Count(n)
    }
}

impl From<u32> for CallExpectation {
    fn from(n: u32) -> Self {
        CallExpectation::from(u64::from(n))
    }
}

impl From<u64> for CallExpectation {
    fn from(n: u64) -> Self {
        match usize::try_from(n) {
            Ok(count) => CallExpectation::Count(count),
            Err(_) => CallExpectation::Invalid(Value::from(n)),
        }
    }
}

// Bare integer literals fall back to i32.
impl From<i32> for CallExpectation {
    fn from(n: i32) -> Self {
        match usize::try_from(n) {
            Ok(count) => CallExpectation::Count(count),
            Err(_) => CallExpectation::Invalid(Value::from(n)),
        }
    }
}

impl From<Vec<Value>> for CallExpectation {
    fn from(args: Vec<Value>) -> Self {
        CallExpectation::Args(args)
    }
}

impl From<Value> for CallExpectation {
    fn from(v: Value) -> Self {
        match v {
            Value::Number(ref n) => match n.as_u64().map(usize::try_from) {
                Some(Ok(count)) => CallExpectation::Count(count),
                _ => CallExpectation::Invalid(v),
            },
            Value::Array(args) => CallExpectation::Args(args),
            other => CallExpectation::Invalid(other),
        }
    }
}

#[derive(Default)]
struct MockLedger {
    calls: HashMap<String, Vec<Vec<Value>>>,
    /// `None` when the function did not exist before `expect`
    originals: HashMap<String, Option<MockFn>>,
}

type LedgerTable = Arc<Mutex<HashMap<LedgerId, MockLedger>>>;

/// Owns the call ledgers of every mocked [`Mockable`]
///
/// Clones share the same ledgers. A handle taken from a test's context stops
/// changing anything once that test is detached after a timeout.
#[derive(Clone, Default)]
pub struct MockRegistry {
    ledgers: LedgerTable,
    live: Liveness,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same ledgers, gated by another test's liveness
    pub(crate) fn with_liveness(&self, live: Liveness) -> Self {
        Self {
            ledgers: Arc::clone(&self.ledgers),
            live,
        }
    }

    /// Run a registry mutation unless this handle's test was detached
    fn while_live<T>(
        &self,
        op: &'static str,
        target: &Mockable,
        f: impl FnOnce() -> T,
    ) -> Option<T> {
        let done = self.live.while_live(f);
        if done.is_none() {
            debug!(module = %target.name(), op, "ignored mock change from a detached test");
        }
        done
    }

    /// Attach an empty ledger to `target`. Does nothing if one is attached already.
    pub fn new_mock(&self, target: &Mockable) {
        self.while_live("new_mock", target, || {
            let mut slot = target.inner.ledger.lock();
            if slot.is_some() {
                return;
            }
            let id = LedgerId(NEXT_LEDGER.fetch_add(1, Ordering::Relaxed));
            self.ledgers.lock().insert(id, MockLedger::default());
            *slot = Some(id);
            debug!(module = %target.name(), ledger = id.0, "mock ledger created");
        });
    }

    /// Whether `target` has a ledger in this registry
    pub fn is_mocked(&self, target: &Mockable) -> bool {
        target
            .ledger_id()
            .is_some_and(|id| self.ledgers.lock().contains_key(&id))
    }

    /// Override `name` on `target`, recording every call made through it
    pub fn expect(
        &self,
        target: &Mockable,
        name: &str,
        replacement: impl Into<Replacement>,
    ) -> TestResult {
        let replacement = replacement.into();
        self.while_live("expect", target, || self.install(target, name, replacement))
            .unwrap_or_else(|| Err(TestError::Detached))
    }

    fn install(&self, target: &Mockable, name: &str, replacement: Replacement) -> TestResult {
        let id = self.active_ledger(target)?;
        let current = target.function(name);

        let original = {
            let mut ledgers = self.ledgers.lock();
            let ledger = ledgers
                .get_mut(&id)
                .ok_or_else(|| not_mocked(target))?;
            ledger.calls.remove(name);
            // Keep the first original so unload restores what existed before mocking.
            ledger
                .originals
                .entry(name.to_string())
                .or_insert(current)
                .clone()
        };

        let ledgers = Arc::clone(&self.ledgers);
        let fname = name.to_string();
        let wrapper: MockFn = Arc::new(move |this: &Mockable, args: &[Value]| {
            let record = || {
                if let Some(ledger) = ledgers.lock().get_mut(&id) {
                    ledger
                        .calls
                        .entry(fname.clone())
                        .or_default()
                        .push(args.to_vec());
                }
            };
            // Calls from a timed-out body's thread belong to no test.
            match body_liveness() {
                Some(caller) => {
                    if caller.while_live(record).is_none() {
                        debug!(
                            module = %this.name(),
                            function = %fname,
                            "dropped call from a detached test"
                        );
                    }
                }
                None => record(),
            }
            match &replacement {
                Replacement::Function(f) => f(this, args),
                Replacement::Passthrough => match &original {
                    Some(f) => f(this, args),
                    None => Err(TestError::UnknownFunction {
                        module: this.name().to_string(),
                        function: fname.clone(),
                    }),
                },
                Replacement::Value(v) => Ok(v.clone()),
            }
        });
        target.swap(name, Some(wrapper));
        debug!(module = %target.name(), function = name, "mock installed");
        Ok(())
    }

    /// Restore every overridden function and drop the ledger
    pub fn unload(&self, target: &Mockable) {
        self.while_live("unload", target, || {
            let mut slot = target.inner.ledger.lock();
            let Some(id) = *slot else {
                return;
            };
            // A ledger held by another registry is not ours to drop.
            let Some(ledger) = self.ledgers.lock().remove(&id) else {
                return;
            };
            for (name, original) in ledger.originals {
                target.swap(&name, original);
            }
            *slot = None;
            debug!(module = %target.name(), ledger = id.0, "mock unloaded");
        });
    }

    /// Argument lists recorded for `name`, oldest first
    pub fn calls(&self, target: &Mockable, name: &str) -> TestResult<Vec<Vec<Value>>> {
        let id = self.active_ledger(target)?;
        let ledgers = self.ledgers.lock();
        let ledger = ledgers.get(&id).ok_or_else(|| not_mocked(target))?;
        Ok(ledger.calls.get(name).cloned().unwrap_or_default())
    }

    /// Check the recorded calls of `name` against `expectation`.
    ///
    /// Does not count an assertion; `TestContext::assert_call` does that.
    #[track_caller]
    pub(crate) fn check_calls(
        &self,
        target: &Mockable,
        name: &str,
        expectation: CallExpectation,
    ) -> TestResult {
        let recorded = self.calls(target, name)?;
        match expectation {
            CallExpectation::Count(expected) => {
                if recorded.len() != expected {
                    return Err(TestError::mismatch(
                        "assertCall",
                        expected.to_string(),
                        recorded.len().to_string(),
                    ));
                }
                Ok(())
            }
            CallExpectation::Args(expected) => {
                if recorded.iter().any(|args| *args == expected) {
                    return Ok(());
                }
                let seen: Vec<Value> = recorded.into_iter().map(Value::Array).collect();
                Err(TestError::mismatch(
                    "assertCall",
                    Value::Array(expected).to_string(),
                    Value::Array(seen).to_string(),
                ))
            }
            CallExpectation::Invalid(v) => Err(TestError::InvalidParameter(format!(
                "expected a call count or an argument list, got {}",
                v
            ))),
        }
    }

    fn active_ledger(&self, target: &Mockable) -> TestResult<LedgerId> {
        target
            .ledger_id()
            .filter(|id| self.ledgers.lock().contains_key(id))
            .ok_or_else(|| not_mocked(target))
    }
}

impl fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRegistry")
            .field("ledgers", &self.ledgers.lock().len())
            .finish()
    }
}

fn not_mocked(target: &Mockable) -> TestError {
    TestError::ModuleNotMocked {
        module: target.name().to_string(),
    }
}
