//! Computed Implementation
//!
//! A Computed is a getter on an observable object whose result is cached
//! and re-evaluated only when one of the atoms it read changes.
//!
//! # How Computeds Work
//!
//! 1. On first access, the getter runs inside its own capturing context and
//!    the result is cached.
//!
//! 2. When accessed again while clean, the cached value is returned.
//!
//! 3. When a dependency changes, the computed is marked stale and reports
//!    its own atom as changed, so whoever read it is notified in turn.
//!
//! 4. The next access re-evaluates.
//!
//! Reading a computed reports only the computed's atom to the enclosing
//! capture; the atoms the getter read stay private to the computed.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::atom::Atom;
use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::{AtomId, SubscriberId};
use crate::value::{Getter, Value};

/// Cache state for a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last evaluation, or the getter never ran.
    Stale,
}

/// A cached derived property that recomputes only when dependencies change.
#[derive(Clone)]
pub struct Computed {
    inner: Arc<ComputedInner>,
}

struct ComputedInner {
    subscriber_id: SubscriberId,

    /// Reported to whoever reads this computed.
    atom: Atom,

    getter: Getter,

    value: Mutex<Option<Value>>,

    state: Mutex<ComputedState>,

    /// Atoms the getter read during its last evaluation.
    observing: Mutex<SmallVec<[AtomId; 8]>>,

    /// Set while the getter runs; a getter that reads itself gets `Undefined`.
    evaluating: AtomicBool,

    eval_count: AtomicUsize,

    _handle: ReactiveHandle,
}

impl Computed {
    /// Create a new computed. The getter is not run until first access.
    pub fn new(name: impl Into<Arc<str>>, getter: Getter) -> Self {
        let atom = Atom::new(name);
        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner>| {
            let subscriber_id = SubscriberId::new();
            let reactive: Weak<dyn Reactive> = weak.clone();
            ComputedInner {
                subscriber_id,
                atom,
                getter,
                value: Mutex::new(None),
                state: Mutex::new(ComputedState::Stale),
                observing: Mutex::new(SmallVec::new()),
                evaluating: AtomicBool::new(false),
                eval_count: AtomicUsize::new(0),
                _handle: Runtime::register(subscriber_id, reactive),
            }
        });

        Self { inner }
    }

    /// Get the current value, re-evaluating with `this` as receiver if stale.
    pub fn get(&self, this: &Value) -> Value {
        self.inner.atom.report_observed();

        if *self.inner.state.lock() == ComputedState::Clean {
            if let Some(value) = self.inner.value.lock().clone() {
                return value;
            }
        }

        self.recompute(this)
    }

    fn recompute(&self, this: &Value) -> Value {
        if self.inner.evaluating.swap(true, Ordering::SeqCst) {
            tracing::warn!(computed = %self.inner.atom.name(), "computed read itself while evaluating");
            return Value::Undefined;
        }

        let (value, deps) = {
            let ctx = ReactiveContext::enter(self.inner.subscriber_id);
            let value = (self.inner.getter)(this);
            (value, ctx.take_dependencies())
        };
        self.inner.evaluating.store(false, Ordering::SeqCst);

        self.inner.rebind(deps);
        *self.inner.value.lock() = Some(value.clone());
        *self.inner.state.lock() = ComputedState::Clean;
        self.inner.eval_count.fetch_add(1, Ordering::SeqCst);

        value
    }

    /// Get the current cache state.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.lock()
    }

    /// Number of times the getter has run.
    pub fn eval_count(&self) -> usize {
        self.inner.eval_count.load(Ordering::SeqCst)
    }

    /// The atom reported to readers of this computed.
    pub fn atom(&self) -> &Atom {
        &self.inner.atom
    }
}

impl ComputedInner {
    fn rebind(&self, deps: Vec<AtomId>) {
        let previous = std::mem::replace(&mut *self.observing.lock(), deps.iter().copied().collect());

        for atom in previous.iter().filter(|atom| !deps.contains(atom)) {
            Runtime::unsubscribe(*atom, self.subscriber_id);
        }
        for atom in deps.iter().filter(|atom| !previous.contains(atom)) {
            Runtime::subscribe(*atom, self.subscriber_id);
        }
    }
}

impl Reactive for ComputedInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_stale(&self) {
        let became_stale = {
            let mut state = self.state.lock();
            let was_clean = *state == ComputedState::Clean;
            *state = ComputedState::Stale;
            was_clean
        };

        // Already-stale computeds have notified their readers.
        if became_stale {
            self.atom.report_changed();
        }
    }

    fn schedule(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.inner.atom.name())
            .field("state", &self.state())
            .field("eval_count", &self.eval_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
