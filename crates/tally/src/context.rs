//! The handle every test body and hook receives

use crate::mock::MockRegistry;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Whether a test still owns its effects on the run.
///
/// Cleared once, when the test loses its timeout race. Work guarded by
/// [`Liveness::while_live`] holds a read lock, so `clear` waits for it and
/// nothing guarded can land after `clear` returns.
#[derive(Clone, Debug)]
pub(crate) struct Liveness(Arc<RwLock<bool>>);

impl Default for Liveness {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(true)))
    }
}

impl Liveness {
    pub fn is_live(&self) -> bool {
        *self.0.read_recursive()
    }

    pub fn clear(&self) {
        *self.0.write() = false;
    }

    /// Run `f` unless cleared
    pub fn while_live<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let live = self.0.read_recursive();
        if *live {
            Some(f())
        } else {
            None
        }
    }
}

thread_local! {
    static BODY_LIVENESS: RefCell<Option<Liveness>> = const { RefCell::new(None) };
}

/// Liveness of the test body running on this thread, if this is a body thread
pub(crate) fn body_liveness() -> Option<Liveness> {
    BODY_LIVENESS.with(|slot| slot.borrow().clone())
}

/// Shared run state reachable from test code: the assertion counter and the
/// mock registry.
///
/// Each test gets its own clone with its own liveness flag. When a test loses
/// its timeout race the flag is cleared. From then on the still-running body
/// can no longer move the assertion counter or change the mock registry.
#[derive(Clone, Debug)]
pub struct TestContext {
    assertions: Arc<AtomicU64>,
    live: Liveness,
    mocks: MockRegistry,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// A standalone context with its own counter and registry
    pub fn new() -> Self {
        let live = Liveness::default();
        Self {
            assertions: Arc::new(AtomicU64::new(0)),
            mocks: MockRegistry::new().with_liveness(live.clone()),
            live,
        }
    }

    /// Same counter and ledgers, fresh liveness flag
    pub(crate) fn scoped(&self) -> Self {
        let live = Liveness::default();
        Self {
            assertions: Arc::clone(&self.assertions),
            mocks: self.mocks.with_liveness(live.clone()),
            live,
        }
    }

    /// Stop this context from touching the run totals or the mocks
    pub(crate) fn detach(&self) {
        self.live.clear();
    }

    /// Mark the current thread as running this context's test body. Mock calls
    /// made on it stop being recorded once the context is detached.
    pub(crate) fn bind_to_current_thread(&self) {
        let live = self.live.clone();
        BODY_LIVENESS.with(|slot| *slot.borrow_mut() = Some(live));
    }

    pub fn is_live(&self) -> bool {
        self.live.is_live()
    }

    /// Count one assertion. Every assertion calls this before checking anything.
    pub fn add_assert(&self) {
        self.live.while_live(|| self.assertions.fetch_add(1, Ordering::SeqCst));
    }

    /// Assertions counted so far across the whole run
    pub fn assertions(&self) -> u64 {
        self.assertions.load(Ordering::SeqCst)
    }

    pub fn mock(&self) -> &MockRegistry {
        &self.mocks
    }
}
