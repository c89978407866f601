//! Reaction Implementation
//!
//! A Reaction is a named subscription unit: it captures the atoms read
//! inside [`Reaction::track`] and runs its effect callback whenever one of
//! them changes.
//!
//! # How Reactions Work
//!
//! 1. `track(f)` runs `f` inside a capturing context and replaces the
//!    observed set with exactly the atoms `f` read.
//!
//! 2. `track_append(f)` does the same but adds to the observed set instead
//!    of replacing it. Several discrete captures can therefore build up one
//!    set, which is what the observer proxy relies on during a render.
//!
//! 3. When an observed atom changes, the effect callback runs. The effect
//!    does not re-track by itself; whoever owns the reaction decides when to
//!    capture again.
//!
//! # Disposal
//!
//! `dispose()` drops every subscription and is idempotent. A disposed
//! reaction still runs functions passed to `track`, but captures nothing.
//! `undispose()` re-arms a disposed reaction in place so that code holding a
//! clone of it keeps pointing at the live instance.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::{untracked, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::{AtomId, SubscriberId};

type Observing = SmallVec<[AtomId; 8]>;

/// How a finished capture is merged into the observed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rebind {
    Replace,
    Append,
}

/// A side-effecting subscription that fires when tracked atoms change.
///
/// # Example
///
/// ```rust,ignore
/// let reaction = Reaction::new("logger", || println!("changed"));
/// reaction.track(|| store.get("count"));
///
/// store.set("count", 1)?;  // Prints: "changed"
/// ```
#[derive(Clone)]
pub struct Reaction {
    inner: Arc<ReactionInner>,
}

struct ReactionInner {
    subscriber_id: SubscriberId,

    name: Arc<str>,

    /// The effect callback.
    effect: Box<dyn Fn() + Send + Sync>,

    /// Atoms captured by the last `track` plus any later `track_append`.
    observing: Mutex<Observing>,

    disposed: AtomicBool,

    /// Number of times the effect has run.
    run_count: AtomicUsize,

    /// Unregisters from the runtime when the last clone drops.
    _handle: ReactiveHandle,
}

impl Reaction {
    /// Create a new reaction with a debug name and an effect callback.
    ///
    /// The reaction observes nothing until `track` is called.
    pub fn new<F>(name: impl Into<Arc<str>>, effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name = name.into();
        let inner = Arc::new_cyclic(|weak: &Weak<ReactionInner>| {
            let subscriber_id = SubscriberId::new();
            let reactive: Weak<dyn Reactive> = weak.clone();
            ReactionInner {
                subscriber_id,
                name,
                effect: Box::new(effect),
                observing: Mutex::new(SmallVec::new()),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
                _handle: Runtime::register(subscriber_id, reactive),
            }
        });

        Self { inner }
    }

    /// Get the reaction's debug name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the subscriber ID for this reaction.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run `f`, replacing the observed set with the atoms it reads.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> R {
        self.capture(f, Rebind::Replace)
    }

    /// Run `f`, adding the atoms it reads to the observed set.
    pub fn track_append<R>(&self, f: impl FnOnce() -> R) -> R {
        self.capture(f, Rebind::Append)
    }

    fn capture<R>(&self, f: impl FnOnce() -> R, mode: Rebind) -> R {
        if self.is_disposed() {
            return untracked(f);
        }

        let (result, deps) = {
            let ctx = ReactiveContext::enter(self.inner.subscriber_id);
            let result = f();
            (result, ctx.take_dependencies())
        };

        // `f` may have disposed us.
        if self.is_disposed() {
            self.inner.clear_observing();
        } else {
            self.inner.rebind(deps, mode);
        }

        result
    }

    /// Stop observing everything. Safe to call repeatedly.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            tracing::trace!(reaction = %self.inner.name, "reaction disposed");
            self.inner.clear_observing();
        }
    }

    /// Re-arm a disposed reaction in place. Its observed set stays empty
    /// until the next capture.
    pub fn undispose(&self) {
        self.inner.disposed.store(false, Ordering::SeqCst);
    }

    /// Check if the reaction has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// The atoms currently observed, in capture order.
    pub fn observing(&self) -> Vec<AtomId> {
        self.inner.observing.lock().to_vec()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Check whether two handles point at the same reaction.
    pub fn ptr_eq(&self, other: &Reaction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ReactionInner {
    fn rebind(&self, deps: Vec<AtomId>, mode: Rebind) {
        let (added, removed) = {
            let mut observing = self.observing.lock();
            let added: Observing = deps
                .iter()
                .copied()
                .filter(|atom| !observing.contains(atom))
                .collect();

            let removed: Observing = match mode {
                Rebind::Replace => {
                    let removed = observing
                        .iter()
                        .copied()
                        .filter(|atom| !deps.contains(atom))
                        .collect();
                    *observing = deps.into_iter().collect();
                    removed
                }
                Rebind::Append => {
                    observing.extend(added.iter().copied());
                    SmallVec::new()
                }
            };

            (added, removed)
        };

        for atom in removed {
            Runtime::unsubscribe(atom, self.subscriber_id);
        }
        for atom in added {
            Runtime::subscribe(atom, self.subscriber_id);
        }
    }

    fn clear_observing(&self) {
        let observing = std::mem::take(&mut *self.observing.lock());
        for atom in observing {
            Runtime::unsubscribe(atom, self.subscriber_id);
        }
    }
}

impl Reactive for ReactionInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_stale(&self) {}

    fn schedule(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.run_count.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(reaction = %self.name, "reaction fired");
        (self.effect)();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("name", &self.inner.name)
            .field("run_count", &self.run_count())
            .field("observing", &self.inner.observing.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
