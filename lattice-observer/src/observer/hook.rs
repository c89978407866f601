//! The `use_observable` hook.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use super::admin::ObserverAdministration;
use super::finalizer;
use crate::config::config;
use crate::host::RenderHooks;
use crate::value::Value;

/// Hook state: the administration of one component usage.
#[derive(Default)]
struct ObserverSlot {
    admin: Mutex<Option<ObserverAdministration>>,
}

/// Return a tracking view of `store` for the current render.
///
/// The component re-renders when, and only when, a property read through
/// the returned value during its latest render changes. Reads made after
/// the render (in event handlers, timers) are not tracked and see the real
/// objects.
///
/// Must be called during render, in the same hook order every time.
///
/// # Example
///
/// ```rust,ignore
/// host.mount(move |cx| {
///     let store = use_observable(cx, &store);
///     store.get("sum").to_string()
/// });
/// ```
pub fn use_observable<H: RenderHooks>(hooks: &mut H, store: &Value) -> Value {
    let slot = hooks.use_ref(ObserverSlot::default);

    let existing = slot.admin.lock().clone();
    let admin = match existing {
        Some(admin) => admin,
        None => {
            if config().sweep_abandoned {
                finalizer::sweep();
            }
            let admin = ObserverAdministration::new(store);
            *slot.admin.lock() = Some(admin.clone());
            admin
        }
    };

    let owner: Arc<dyn Any + Send + Sync> = slot;
    admin.begin_render(&Arc::downgrade(&owner));

    let committed = admin.clone();
    hooks.use_effect(Box::new(move || committed.end_render()));
    hooks.use_sync_external_store(admin.as_store());

    admin.wrap(store.clone())
}
