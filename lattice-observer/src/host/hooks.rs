//! Render context: hook state for one render of one instance.

use std::any::Any;
use std::sync::Arc;

use super::{ExternalStore, RenderHooks, StateVersion};

pub(super) type HookSlot = Arc<dyn Any + Send + Sync>;

/// A store read during render, with the snapshot the render saw.
pub(super) struct StoreUse {
    pub(super) store: Arc<dyn ExternalStore>,
    pub(super) snapshot: StateVersion,
}

/// Passed to a component while it renders.
pub struct RenderContext {
    slots: Vec<HookSlot>,
    cursor: usize,
    pub(super) effects: Vec<Box<dyn FnOnce() + Send>>,
    pub(super) stores: Vec<StoreUse>,
}

impl RenderContext {
    pub(super) fn new(slots: Vec<HookSlot>) -> Self {
        Self {
            slots,
            cursor: 0,
            effects: Vec::new(),
            stores: Vec::new(),
        }
    }

    pub(super) fn into_slots(self) -> (Vec<HookSlot>, Vec<Box<dyn FnOnce() + Send>>, Vec<StoreUse>) {
        (self.slots, self.effects, self.stores)
    }
}

impl RenderHooks for RenderContext {
    fn use_ref<T, F>(&mut self, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let index = self.cursor;
        self.cursor += 1;

        if let Some(slot) = self.slots.get(index) {
            if let Ok(value) = Arc::clone(slot).downcast::<T>() {
                return value;
            }
            tracing::warn!(index, "hook order changed between renders, slot reset");
        }

        let value = Arc::new(init());
        let slot: HookSlot = value.clone();
        if index < self.slots.len() {
            self.slots[index] = slot;
        } else {
            self.slots.push(slot);
        }
        value
    }

    fn use_effect(&mut self, effect: Box<dyn FnOnce() + Send>) {
        self.effects.push(effect);
    }

    fn use_sync_external_store(&mut self, store: Arc<dyn ExternalStore>) -> StateVersion {
        let snapshot = store.get_snapshot();
        self.stores.push(StoreUse { store, snapshot });
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn use_ref_persists_across_renders() {
        let mut first = RenderContext::new(Vec::new());
        let counter = first.use_ref(|| Mutex::new(0));
        *counter.lock() += 1;
        let (slots, _, _) = first.into_slots();

        let mut second = RenderContext::new(slots);
        let counter = second.use_ref(|| Mutex::new(100));
        assert_eq!(*counter.lock(), 1);
    }

    #[test]
    fn mismatched_slot_type_is_reinitialized() {
        let mut first = RenderContext::new(Vec::new());
        first.use_ref(|| 1u32);
        let (slots, _, _) = first.into_slots();

        let mut second = RenderContext::new(slots);
        let value = second.use_ref(|| String::from("fresh"));
        assert_eq!(value.as_str(), "fresh");
    }
}
