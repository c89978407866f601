//! Observer Administration
//!
//! One administration backs one component usage. It owns the reaction that
//! records what the last render read, the host's change callback, the
//! snapshot token, and the proxy cache.
//!
//! # Lifecycle
//!
//! ```text
//!            begin_render            end_render
//!   Fresh ────────────────► Tracking ──────────► Idle
//!                              ▲                   │
//!                              └── begin_render ───┘  (dispose + undispose)
//!
//!   host cleanup ──► Disposed      leak sweep ──► Orphaned
//! ```
//!
//! From `Disposed` or `Orphaned`, the next render or subscribe builds a new
//! reaction. A live reaction is never replaced: the host's subscription and
//! the effect closure both refer to it.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::finalizer::{self, RegistrationToken};
use crate::host::{ExternalStore, StateVersion, StoreCallback, Unsubscribe};
use crate::observable::debug_name;
use crate::reactive::{AtomId, Reaction};
use crate::value::{Function, Object, Value};

/// Where an administration is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created; no render has started yet.
    Fresh,
    /// A render is reading through the proxies.
    Tracking,
    /// The last render committed.
    Idle,
    /// The leak sweep disposed the reaction.
    Orphaned,
    /// The host cleaned up the subscription.
    Disposed,
}

enum ReactionState {
    Active(Reaction),
    Orphaned,
    Disposed,
}

enum MountState {
    Pending,
    Mounted(StoreCallback),
}

struct AdminState {
    reaction: ReactionState,
    mount: MountState,
    phase: Phase,
    version: StateVersion,
    leak_token: Option<RegistrationToken>,
}

pub(super) struct AdminInner {
    this: Weak<AdminInner>,
    name: Arc<str>,
    in_render: AtomicBool,
    /// Set at render start; the first tracked access of the render resets
    /// the reaction's observed set and clears it.
    needs_reset: AtomicBool,
    /// Non-zero while a tracked access of this administration is running.
    capture_depth: AtomicUsize,
    state: Mutex<AdminState>,
    /// Target address to proxy. Pruned at render start once nothing outside
    /// the administration holds the target.
    pub(super) cache: Mutex<HashMap<usize, Object>>,
    /// (owner address, function address, tracked) to (original, wrapper).
    pub(super) functions: Mutex<HashMap<(usize, usize, bool), (Function, Function)>>,
}

/// Per-component-usage observer state. Cloning yields another handle to the
/// same administration.
#[derive(Clone)]
pub struct ObserverAdministration {
    inner: Arc<AdminInner>,
}

/// Restores the capture depth when a tracked access unwinds.
struct DepthGuard<'a>(&'a AtomicUsize);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ObserverAdministration {
    /// Create an administration for `root`. Its reaction exists but observes
    /// nothing until the first render reads something.
    pub fn new(root: &Value) -> Self {
        let name: Arc<str> = format!("observer({})", debug_name(root)).into();
        let inner = Arc::new_cyclic(|this: &Weak<AdminInner>| AdminInner {
            this: this.clone(),
            name: name.clone(),
            in_render: AtomicBool::new(false),
            needs_reset: AtomicBool::new(true),
            capture_depth: AtomicUsize::new(0),
            state: Mutex::new(AdminState {
                reaction: ReactionState::Active(AdminInner::new_reaction(this, &name)),
                mount: MountState::Pending,
                phase: Phase::Fresh,
                version: StateVersion::fresh(),
                leak_token: None,
            }),
            cache: Mutex::new(HashMap::new()),
            functions: Mutex::new(HashMap::new()),
        });

        tracing::debug!(observer = %name, "administration created");
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    pub fn in_render(&self) -> bool {
        self.inner.in_render()
    }

    /// Whether a reaction is currently alive.
    pub fn has_reaction(&self) -> bool {
        self.inner.active_reaction().is_some()
    }

    /// Atoms the reaction observes right now.
    pub fn observing(&self) -> Vec<AtomId> {
        self.inner
            .active_reaction()
            .map(|reaction| reaction.observing())
            .unwrap_or_default()
    }

    /// The administration as the host sees it. Always the same allocation.
    pub fn as_store(&self) -> Arc<dyn ExternalStore> {
        self.inner.clone()
    }

    /// Enter render mode. A live reaction is disposed and re-armed in place
    /// so this render's reads replace the last render's; a lost reaction is
    /// rebuilt and registered with the leak registry against `owner`.
    pub fn begin_render(&self, owner: &Weak<dyn Any + Send + Sync>) {
        let inner = &self.inner;
        inner.prune_cache();
        inner.in_render.store(true, Ordering::SeqCst);
        inner.needs_reset.store(true, Ordering::SeqCst);

        enum Step {
            Register,
            Reset(Reaction),
            Rebuild,
        }

        let step = {
            let mut state = inner.state.lock();
            let step = match (&state.reaction, state.phase) {
                (ReactionState::Active(_), Phase::Fresh) => Step::Register,
                (ReactionState::Active(reaction), _) => Step::Reset(reaction.clone()),
                (ReactionState::Orphaned | ReactionState::Disposed, _) => Step::Rebuild,
            };
            state.phase = Phase::Tracking;
            if let Step::Rebuild = step {
                state.reaction = ReactionState::Active(AdminInner::new_reaction(&inner.this, &inner.name));
            }
            step
        };

        match step {
            Step::Register => self.register_leak(owner),
            Step::Reset(reaction) => {
                reaction.dispose();
                reaction.undispose();
                tracing::trace!(observer = %inner.name, "re-tracking");
            }
            Step::Rebuild => {
                tracing::debug!(observer = %inner.name, "reaction rebuilt for render");
                self.register_leak(owner);
            }
        }
    }

    /// Leave render mode. Runs as the post-commit effect.
    pub fn end_render(&self) {
        self.inner.in_render.store(false, Ordering::SeqCst);
        let mut state = self.inner.state.lock();
        if state.phase == Phase::Tracking {
            state.phase = Phase::Idle;
        }
    }

    fn register_leak(&self, owner: &Weak<dyn Any + Send + Sync>) {
        let token = finalizer::register(owner.clone(), self.clone());
        let previous = self.inner.state.lock().leak_token.replace(token);
        if let Some(previous) = previous {
            finalizer::unregister(previous);
        }
    }

    /// Dispose the reaction of an administration whose owner vanished
    /// without mounting.
    pub(super) fn orphan(&self) {
        let reaction = {
            let mut state = self.inner.state.lock();
            state.leak_token = None;
            state.mount = MountState::Pending;
            state.phase = Phase::Orphaned;
            std::mem::replace(&mut state.reaction, ReactionState::Orphaned)
        };

        if let ReactionState::Active(reaction) = reaction {
            reaction.dispose();
        }
        tracing::debug!(observer = %self.inner.name, "administration orphaned");
    }

    /// Number of proxies currently cached.
    pub fn cached_proxies(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// Wrap `value` in this administration's tracking proxy.
    pub fn wrap(&self, value: Value) -> Value {
        super::proxy::make_reactive_proxy(&self.inner, value)
    }

    pub fn get_snapshot(&self) -> StateVersion {
        self.inner.get_snapshot()
    }

    pub fn subscribe(&self, on_store_change: StoreCallback) -> Unsubscribe {
        self.inner.subscribe(on_store_change)
    }
}

impl AdminInner {
    fn new_reaction(this: &Weak<AdminInner>, name: &Arc<str>) -> Reaction {
        let this = this.clone();
        Reaction::new(name.clone(), move || {
            if let Some(admin) = this.upgrade() {
                admin.on_reaction_fired();
            }
        })
    }

    /// A tracked dependency changed: new snapshot, then tell the host.
    fn on_reaction_fired(&self) {
        let callback = {
            let mut state = self.state.lock();
            state.version = StateVersion::fresh();
            match &state.mount {
                MountState::Mounted(callback) => Some(callback.clone()),
                MountState::Pending => None,
            }
        };

        if let Some(callback) = callback {
            callback();
        }
    }

    pub(super) fn in_render(&self) -> bool {
        self.in_render.load(Ordering::SeqCst)
    }

    fn active_reaction(&self) -> Option<Reaction> {
        match &self.state.lock().reaction {
            ReactionState::Active(reaction) => Some(reaction.clone()),
            ReactionState::Orphaned | ReactionState::Disposed => None,
        }
    }

    /// Run `f` as one tracked access. In render the first access resets the
    /// reaction and later ones add to it; nested accesses run inside the
    /// enclosing one. Outside render `f` just runs.
    pub(super) fn track_access<R>(&self, f: impl FnOnce() -> R) -> R {
        if !self.in_render() || self.capture_depth.load(Ordering::SeqCst) > 0 {
            return f();
        }
        let Some(reaction) = self.active_reaction() else {
            return f();
        };

        let _depth = DepthGuard::enter(&self.capture_depth);
        if self.needs_reset.swap(false, Ordering::SeqCst) {
            reaction.track(f)
        } else {
            reaction.track_append(f)
        }
    }

    /// Evict proxies whose target is held only by this administration: by
    /// the proxy itself and by cached function wrappers bound to it. An
    /// evicted list releases its items, so this repeats until nothing more
    /// frees up.
    fn prune_cache(&self) {
        let mut cache = self.cache.lock();
        let mut functions = self.functions.lock();
        let before = cache.len();

        loop {
            let mut held: HashMap<usize, usize> = HashMap::new();
            let mut pinned: HashSet<usize> = HashSet::new();
            for ((owner, _, _), (_, wrapper)) in functions.iter() {
                *held.entry(*owner).or_default() += 1;
                if wrapper.handle_count() > 1 {
                    pinned.insert(*owner);
                }
            }

            let dead: Vec<usize> = cache
                .iter()
                .filter(|(addr, proxy)| {
                    let Some(target) = proxy.proxy_target() else {
                        return false;
                    };
                    let internal = 1 + held.get(*addr).copied().unwrap_or(0);
                    proxy.handle_count() == 1
                        && target.handle_count() <= internal
                        && !pinned.contains(*addr)
                })
                .map(|(addr, _)| *addr)
                .collect();
            if dead.is_empty() {
                break;
            }

            let dead: HashSet<usize> = dead.into_iter().collect();
            functions.retain(|(owner, _, _), _| !dead.contains(owner));
            cache.retain(|addr, _| !dead.contains(addr));
        }

        let evicted = before - cache.len();
        if evicted > 0 {
            tracing::trace!(observer = %self.name, evicted, "pruned proxy cache");
        }
    }

    fn release(&self) {
        let reaction = {
            let mut state = self.state.lock();
            state.mount = MountState::Pending;
            state.phase = Phase::Disposed;
            std::mem::replace(&mut state.reaction, ReactionState::Disposed)
        };

        if let ReactionState::Active(reaction) = reaction {
            reaction.dispose();
        }
        tracing::debug!(observer = %self.name, "subscription cleaned up");
    }
}

impl ExternalStore for AdminInner {
    fn subscribe(&self, on_store_change: StoreCallback) -> Unsubscribe {
        let (token, rebuilt) = {
            let mut state = self.state.lock();
            let token = state.leak_token.take();
            state.mount = MountState::Mounted(on_store_change);

            let rebuilt = !matches!(state.reaction, ReactionState::Active(_));
            if rebuilt {
                state.reaction = ReactionState::Active(Self::new_reaction(&self.this, &self.name));
                state.version = StateVersion::fresh();
                state.phase = Phase::Idle;
            }
            (token, rebuilt)
        };

        if let Some(token) = token {
            finalizer::unregister(token);
        }
        if rebuilt {
            tracing::debug!(observer = %self.name, "reaction lost before subscribe, rebuilt");
        }

        let admin = self.this.upgrade();
        let released = AtomicBool::new(false);
        Box::new(move || {
            if released.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(admin) = &admin {
                admin.release();
            }
        })
    }

    fn get_snapshot(&self) -> StateVersion {
        self.state.lock().version
    }
}

impl fmt::Debug for ObserverAdministration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverAdministration")
            .field("name", &self.inner.name)
            .field("phase", &self.phase())
            .field("in_render", &self.in_render())
            .field("cached_proxies", &self.inner.cache.lock().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::observable;
    use crate::value::ObjectBuilder;

    fn store() -> Value {
        observable(ObjectBuilder::new("Store").field("a", 1).field("b", 2).build())
    }

    fn owner() -> Arc<dyn Any + Send + Sync> {
        Arc::new(())
    }

    fn counting_callback() -> (StoreCallback, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let callback: StoreCallback = Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        (callback, calls)
    }

    #[test]
    fn name_is_derived_from_root() {
        let admin = ObserverAdministration::new(&store());
        assert!(admin.name().starts_with("observer(Store@"));
        assert_eq!(admin.phase(), Phase::Fresh);
    }

    #[test]
    fn render_cycle_moves_through_phases() {
        let root = store();
        let owner = owner();
        let admin = ObserverAdministration::new(&root);

        admin.begin_render(&Arc::downgrade(&owner));
        assert_eq!(admin.phase(), Phase::Tracking);
        assert!(admin.in_render());

        admin.end_render();
        assert_eq!(admin.phase(), Phase::Idle);
        assert!(!admin.in_render());
    }

    #[test]
    fn tracked_change_bumps_snapshot_and_notifies() {
        let root = store();
        let owner = owner();
        let admin = ObserverAdministration::new(&root);
        admin.begin_render(&Arc::downgrade(&owner));
        admin.wrap(root.clone()).get("a");
        admin.end_render();

        let (callback, calls) = counting_callback();
        let _unsubscribe = admin.subscribe(callback);
        let before = admin.get_snapshot();

        root.as_object().unwrap().set("b", 5).unwrap();
        assert_eq!(admin.get_snapshot(), before);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        root.as_object().unwrap().set("a", 5).unwrap();
        assert_ne!(admin.get_snapshot(), before);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_is_idempotent_and_disposes() {
        let root = store();
        let admin = ObserverAdministration::new(&root);
        let (callback, _) = counting_callback();

        let unsubscribe = admin.subscribe(callback);
        unsubscribe();
        unsubscribe();

        assert_eq!(admin.phase(), Phase::Disposed);
        assert!(!admin.has_reaction());
    }

    #[test]
    fn stale_cleanup_does_not_touch_newer_subscription() {
        let admin = ObserverAdministration::new(&store());
        let (first, _) = counting_callback();
        let (second, _) = counting_callback();

        let unsubscribe_first = admin.subscribe(first);
        unsubscribe_first();
        let _unsubscribe_second = admin.subscribe(second);
        unsubscribe_first();

        assert!(admin.has_reaction());
    }

    #[test]
    fn subscribe_after_loss_rebuilds_and_bumps_version() {
        let admin = ObserverAdministration::new(&store());
        let (callback, _) = counting_callback();
        admin.subscribe(callback.clone())();
        let before = admin.get_snapshot();

        let _unsubscribe = admin.subscribe(callback);

        assert!(admin.has_reaction());
        assert_ne!(admin.get_snapshot(), before);
    }

    #[test]
    fn rerender_keeps_the_same_store_identity() {
        let admin = ObserverAdministration::new(&store());
        let a = admin.as_store();
        let b = admin.clone().as_store();
        assert!(std::ptr::eq(Arc::as_ptr(&a) as *const (), Arc::as_ptr(&b) as *const ()));
    }

    #[test]
    fn render_after_dispose_rebuilds_reaction() {
        let root = store();
        let owner = owner();
        let admin = ObserverAdministration::new(&root);
        let (callback, _) = counting_callback();
        admin.subscribe(callback)();
        assert!(!admin.has_reaction());

        admin.begin_render(&Arc::downgrade(&owner));

        assert!(admin.has_reaction());
        assert_eq!(admin.phase(), Phase::Tracking);
    }

    #[test]
    fn replaced_items_leave_the_proxy_cache() {
        let root = observable(Value::from_json(serde_json::json!({ "items": [{ "id": 1 }] })));
        let owner = owner();
        let admin = ObserverAdministration::new(&root);

        admin.begin_render(&Arc::downgrade(&owner));
        admin.wrap(root.clone()).get("items").get(0usize).get("id");
        admin.end_render();
        assert_eq!(admin.cached_proxies(), 3);

        let replacement = Value::from_json(serde_json::json!([{ "id": 2 }]));
        root.as_object().unwrap().set("items", replacement).unwrap();

        admin.begin_render(&Arc::downgrade(&owner));
        assert_eq!(admin.cached_proxies(), 1);
    }

    #[test]
    fn reachable_targets_keep_their_proxies() {
        let root = observable(Value::from_json(serde_json::json!({ "child": { "x": 1 } })));
        let owner = owner();
        let admin = ObserverAdministration::new(&root);

        admin.begin_render(&Arc::downgrade(&owner));
        let child = admin.wrap(root.clone()).get("child");
        admin.end_render();

        admin.begin_render(&Arc::downgrade(&owner));
        assert_eq!(admin.cached_proxies(), 2);
        assert_eq!(admin.wrap(root.clone()).get("child"), child);
    }
}
