//! Render scheduler: mounts components, commits renders, and re-renders
//! instances whose stores changed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::hooks::{HookSlot, RenderContext, StoreUse};
use super::{ExternalStore, StateVersion, StoreCallback, Unsubscribe};

/// A component: renders to text, calling hooks on the context.
pub type Component = Arc<dyn Fn(&mut RenderContext) -> String + Send + Sync>;

/// Upper bound on render passes per flush. A component whose render
/// always dirties itself would otherwise spin forever.
const MAX_FLUSH_PASSES: usize = 100;

/// A live store subscription of one instance.
struct Binding {
    store: Arc<dyn ExternalStore>,
    snapshot: StateVersion,
    unsubscribe: Unsubscribe,
}

struct Instance {
    component: Component,
    slots: Mutex<Vec<HookSlot>>,
    bindings: Mutex<Vec<Binding>>,
    /// Set by store callbacks; cleared when a render starts.
    dirty: Arc<AtomicBool>,
    output: Mutex<String>,
    render_count: AtomicUsize,
    mounted: AtomicBool,
}

fn same_store(a: &Arc<dyn ExternalStore>, b: &Arc<dyn ExternalStore>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Instance {
    fn new(component: Component) -> Self {
        Self {
            component,
            slots: Mutex::new(Vec::new()),
            bindings: Mutex::new(Vec::new()),
            dirty: Arc::new(AtomicBool::new(false)),
            output: Mutex::new(String::new()),
            render_count: AtomicUsize::new(0),
            mounted: AtomicBool::new(true),
        }
    }

    /// Run the component. Returns what the commit phase needs.
    fn render(&self) -> (String, Vec<Box<dyn FnOnce() + Send>>, Vec<StoreUse>) {
        self.dirty.store(false, Ordering::SeqCst);
        let slots = std::mem::take(&mut *self.slots.lock());

        let mut cx = RenderContext::new(slots);
        let output = (self.component)(&mut cx);
        let (slots, effects, stores) = cx.into_slots();

        *self.slots.lock() = slots;
        self.render_count.fetch_add(1, Ordering::SeqCst);
        (output, effects, stores)
    }

    fn render_and_commit(&self) {
        let (output, effects, stores) = self.render();
        *self.output.lock() = output;
        self.commit(effects, stores);
    }

    fn callback(&self) -> StoreCallback {
        let dirty = self.dirty.clone();
        Arc::new(move || dirty.store(true, Ordering::SeqCst))
    }

    fn commit(&self, effects: Vec<Box<dyn FnOnce() + Send>>, stores: Vec<StoreUse>) {
        for effect in effects {
            effect();
        }

        let previous = std::mem::take(&mut *self.bindings.lock());
        let mut previous: Vec<Option<Binding>> = previous.into_iter().map(Some).collect();
        let mut next = Vec::with_capacity(stores.len());

        for (index, used) in stores.into_iter().enumerate() {
            let kept = match previous.get_mut(index) {
                Some(slot) if slot.as_ref().is_some_and(|b| same_store(&b.store, &used.store)) => {
                    slot.take()
                }
                _ => None,
            };

            let binding = match kept {
                Some(binding) => Binding {
                    snapshot: used.snapshot,
                    ..binding
                },
                None => Binding {
                    unsubscribe: used.store.subscribe(self.callback()),
                    store: used.store,
                    snapshot: used.snapshot,
                },
            };
            next.push(binding);
        }

        for binding in previous.into_iter().flatten() {
            (binding.unsubscribe)();
        }

        *self.bindings.lock() = next;
        self.check_snapshots();
    }

    /// Mark dirty if any store moved past the snapshot this instance
    /// rendered with.
    fn check_snapshots(&self) {
        let stale = {
            let bindings = self.bindings.lock();
            bindings
                .iter()
                .any(|binding| binding.store.get_snapshot() != binding.snapshot)
        };
        if stale {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    fn needs_render(&self) -> bool {
        if !self.mounted.load(Ordering::SeqCst) {
            return false;
        }
        self.check_snapshots();
        self.dirty.load(Ordering::SeqCst)
    }

    fn unsubscribe_all(&self) {
        let bindings = std::mem::take(&mut *self.bindings.lock());
        for binding in &bindings {
            (binding.unsubscribe)();
        }
        *self.bindings.lock() = bindings;
    }

    fn resubscribe_all(&self) {
        let mut bindings = self.bindings.lock();
        for binding in bindings.iter_mut() {
            binding.unsubscribe = binding.store.subscribe(self.callback());
        }
    }
}

/// A synchronous host.
#[derive(Clone, Default)]
pub struct Host {
    instances: Arc<Mutex<Vec<Arc<Instance>>>>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render and commit a new instance of `component`.
    pub fn mount<F>(&self, component: F) -> ComponentHandle
    where
        F: Fn(&mut RenderContext) -> String + Send + Sync + 'static,
    {
        self.mount_component(Arc::new(component))
    }

    pub fn mount_component(&self, component: Component) -> ComponentHandle {
        let instance = Arc::new(Instance::new(component));
        self.instances.lock().push(instance.clone());
        instance.render_and_commit();

        ComponentHandle {
            host: self.clone(),
            instance,
        }
    }

    /// Render `component` once and throw the result away without
    /// committing. Its hook state is dropped with it.
    pub fn render_abandoned<F>(&self, component: F) -> String
    where
        F: Fn(&mut RenderContext) -> String + Send + Sync + 'static,
    {
        let instance = Instance::new(Arc::new(component));
        let (output, _effects, _stores) = instance.render();
        tracing::trace!("render abandoned before commit");
        output
    }

    /// Re-render every mounted instance that was notified or whose store
    /// snapshot changed, until none is left. Returns the number of renders.
    pub fn flush(&self) -> usize {
        let mut renders = 0;

        for _ in 0..MAX_FLUSH_PASSES {
            let pending: Vec<Arc<Instance>> = self
                .instances
                .lock()
                .iter()
                .filter(|instance| instance.needs_render())
                .cloned()
                .collect();

            if pending.is_empty() {
                return renders;
            }
            for instance in pending {
                instance.render_and_commit();
                renders += 1;
            }
        }

        tracing::warn!(renders, "flush did not settle");
        renders
    }

    fn remove(&self, instance: &Arc<Instance>) {
        self.instances.lock().retain(|other| !Arc::ptr_eq(other, instance));
    }
}

/// Handle to a mounted component instance.
pub struct ComponentHandle {
    host: Host,
    instance: Arc<Instance>,
}

impl ComponentHandle {
    /// Output of the last committed render.
    pub fn output(&self) -> String {
        self.instance.output.lock().clone()
    }

    pub fn render_count(&self) -> usize {
        self.instance.render_count.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self) -> bool {
        self.instance.mounted.load(Ordering::SeqCst)
    }

    /// Unsubscribe every store and drop the hook state.
    pub fn unmount(&self) {
        if !self.instance.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        self.instance.unsubscribe_all();
        self.instance.bindings.lock().clear();
        self.instance.slots.lock().clear();
        self.host.remove(&self.instance);
    }

    /// Tear down and re-create every subscription without rendering, the
    /// way a development-mode double mount does.
    pub fn remount_effects(&self) {
        if !self.is_mounted() {
            return;
        }
        self.instance.unsubscribe_all();
        self.instance.resubscribe_all();
        self.instance.check_snapshots();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RenderHooks;
    use std::sync::atomic::AtomicU64;

    /// A store whose snapshot is a counter.
    #[derive(Default)]
    struct CounterStore {
        version: Mutex<Option<StateVersion>>,
        value: AtomicU64,
        listeners: Mutex<Vec<StoreCallback>>,
        subscribes: AtomicUsize,
    }

    impl CounterStore {
        fn bump(&self) {
            self.value.fetch_add(1, Ordering::SeqCst);
            *self.version.lock() = Some(StateVersion::fresh());
            let listeners = self.listeners.lock().clone();
            for listener in listeners {
                listener();
            }
        }
    }

    impl ExternalStore for CounterStore {
        fn subscribe(&self, on_store_change: StoreCallback) -> Unsubscribe {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            self.listeners.lock().push(on_store_change);
            Box::new(|| {})
        }

        fn get_snapshot(&self) -> StateVersion {
            *self.version.lock().get_or_insert_with(StateVersion::fresh)
        }
    }

    fn counter_component(
        store: Arc<CounterStore>,
    ) -> impl Fn(&mut RenderContext) -> String + Send + Sync + 'static {
        move |cx| {
            cx.use_sync_external_store(store.clone());
            store.value.load(Ordering::SeqCst).to_string()
        }
    }

    #[test]
    fn store_change_rerenders_on_flush() {
        let host = Host::new();
        let store = Arc::new(CounterStore::default());
        let handle = host.mount(counter_component(store.clone()));

        assert_eq!(handle.output(), "0");
        assert_eq!(host.flush(), 0);

        store.bump();
        assert_eq!(host.flush(), 1);
        assert_eq!(handle.output(), "1");
        assert_eq!(handle.render_count(), 2);
        assert_eq!(store.subscribes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effects_run_after_commit() {
        let host = Host::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        host.mount(move |cx| {
            let ran = ran_clone.clone();
            cx.use_effect(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
            String::new()
        });

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn abandoned_render_never_subscribes() {
        let host = Host::new();
        let store = Arc::new(CounterStore::default());

        let output = host.render_abandoned(counter_component(store.clone()));

        assert_eq!(output, "0");
        assert_eq!(store.subscribes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unmounted_instances_do_not_render() {
        let host = Host::new();
        let store = Arc::new(CounterStore::default());
        let handle = host.mount(counter_component(store.clone()));

        handle.unmount();
        store.bump();

        assert_eq!(host.flush(), 0);
        assert!(!handle.is_mounted());
    }

    #[test]
    fn remount_resubscribes_without_rendering() {
        let host = Host::new();
        let store = Arc::new(CounterStore::default());
        let handle = host.mount(counter_component(store.clone()));

        handle.remount_effects();

        assert_eq!(store.subscribes.load(Ordering::SeqCst), 2);
        assert_eq!(handle.render_count(), 1);
    }
}
