//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects atoms to the
//! computeds and reactions observing them.
//!
//! # How It Works
//!
//! 1. When a computed or reaction is created, it registers with the runtime.
//!
//! 2. When it finishes a capture, it subscribes to every atom it observed
//!    (and unsubscribes from the ones it no longer observes).
//!
//! 3. When an atom changes, the runtime:
//!    a. Finds all subscribers
//!    b. Marks them stale (computeds propagate to their own observers)
//!    c. Schedules the eager ones (reactions)
//!
//! # Thread Safety
//!
//! The capture stack is thread-local (see [`ReactiveContext`]); the registry
//! and the subscription table are global so observable objects can be shared
//! across threads.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{AtomId, SubscriberId};

/// A trait for types that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this reactive value as needing re-evaluation.
    fn mark_stale(&self);

    /// Run this reactive value's side effect (reactions only).
    fn schedule(&self);

    /// Check if this reactive value is a reaction (eager) or computed (lazy).
    fn is_eager(&self) -> bool;
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
#[derive(Debug)]
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

type Subscribers = SmallVec<[SubscriberId; 4]>;

/// The global reactive runtime.
pub struct Runtime;

// Maps subscriber IDs to weak references so the registry never keeps a
// reaction alive on its own.
static REGISTRY: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();
static ATOM_SUBSCRIBERS: OnceLock<DashMap<AtomId, Subscribers>> = OnceLock::new();

fn registry() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn atom_subscribers() -> &'static DashMap<AtomId, Subscribers> {
    ATOM_SUBSCRIBERS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a reactive value with the runtime.
    ///
    /// Returns a handle that unregisters the value when dropped.
    pub fn register(subscriber_id: SubscriberId, reactive: Weak<dyn Reactive>) -> ReactiveHandle {
        registry().insert(subscriber_id, reactive);
        ReactiveHandle { subscriber_id }
    }

    /// Unregister a reactive value and drop all of its subscriptions.
    fn unregister(id: SubscriberId) {
        registry().remove(&id);

        for mut subs in atom_subscribers().iter_mut() {
            subs.retain(|s| *s != id);
        }
    }

    /// Record that `subscriber_id` observes `atom`.
    pub fn subscribe(atom: AtomId, subscriber_id: SubscriberId) {
        let mut subs = atom_subscribers().entry(atom).or_default();
        if !subs.contains(&subscriber_id) {
            subs.push(subscriber_id);
        }
    }

    /// Remove a single subscription.
    pub fn unsubscribe(atom: AtomId, subscriber_id: SubscriberId) {
        if let Some(mut subs) = atom_subscribers().get_mut(&atom) {
            subs.retain(|s| *s != subscriber_id);
        }
        atom_subscribers().remove_if(&atom, |_, subs| subs.is_empty());
    }

    /// Record a read of `atom` in the current capture, if any.
    pub fn report_observed(atom: AtomId) {
        ReactiveContext::track_dependency(atom);
    }

    /// Notify all subscribers that an atom changed.
    ///
    /// This is the core update propagation mechanism.
    pub fn report_changed(atom: AtomId) {
        let subscriber_ids = match atom_subscribers().get(&atom) {
            Some(subs) => subs.clone(),
            None => return,
        };

        let reactives: Vec<Arc<dyn Reactive>> = subscriber_ids
            .iter()
            .filter_map(|id| registry().get(id).and_then(|weak| weak.upgrade()))
            .collect();

        for reactive in &reactives {
            reactive.mark_stale();
        }

        for reactive in reactives {
            if reactive.is_eager() {
                reactive.schedule();
            }
        }
    }

    /// Number of subscribers currently observing `atom`.
    pub fn observer_count(atom: AtomId) -> usize {
        atom_subscribers().get(&atom).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Check whether a subscriber is still registered.
    pub fn is_registered(id: SubscriberId) -> bool {
        registry().contains_key(&id)
    }

    /// Check if we're inside a capturing context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
