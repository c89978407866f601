//! Host Rendering Model
//!
//! The observer plugs into a component renderer through three hooks: a
//! persistent per-instance slot, a post-commit effect, and an external
//! store subscription. This module defines those seams as traits and ships
//! a small synchronous host that drives them.
//!
//! # Lifecycle
//!
//! A render runs the component with a [`RenderContext`]. Hooks are matched
//! to slots by call order. Once the render returns, the host commits it:
//! effects run in registration order, then each store used during the render
//! is subscribed (first commit) or kept (later commits). A store callback
//! marks the instance dirty; [`Host::flush`] re-renders dirty instances and
//! instances whose snapshot moved since their last render.
//!
//! A render can also be abandoned: it runs, but is never committed, so no
//! effect runs and nothing subscribes.

mod hooks;
mod scheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use hooks::RenderContext;
pub use scheduler::{Component, ComponentHandle, Host};

use crate::value::Value;

/// Invoked by a store when its snapshot may have changed.
pub type StoreCallback = Arc<dyn Fn() + Send + Sync>;

/// Returned by [`ExternalStore::subscribe`]. Calling it more than once is a
/// no-op after the first call.
pub type Unsubscribe = Box<dyn Fn() + Send + Sync>;

/// An opaque snapshot token. Two tokens are equal only if one is a copy of
/// the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateVersion(u64);

impl StateVersion {
    /// A token distinct from every token created before it.
    pub fn fresh() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A source of state the host subscribes to.
pub trait ExternalStore: Send + Sync {
    fn subscribe(&self, on_store_change: StoreCallback) -> Unsubscribe;

    fn get_snapshot(&self) -> StateVersion;
}

/// The hooks a component can call during render.
pub trait RenderHooks {
    /// A value that lives as long as the component instance. `init` runs on
    /// the first render only.
    fn use_ref<T, F>(&mut self, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T;

    /// Run `effect` after this render commits.
    fn use_effect(&mut self, effect: Box<dyn FnOnce() + Send>);

    /// Read the store's snapshot and keep the instance subscribed to it.
    fn use_sync_external_store(&mut self, store: Arc<dyn ExternalStore>) -> StateVersion;
}

/// Whether `value` is a host element.
pub fn is_valid_element(value: &Value) -> bool {
    matches!(value, Value::Element(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Element, Object};

    #[test]
    fn versions_are_unique() {
        let a = StateVersion::fresh();
        let b = StateVersion::fresh();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn only_elements_are_valid_elements() {
        assert!(is_valid_element(&Value::from(Element::new("span"))));
        assert!(!is_valid_element(&Value::from(Object::record())));
        assert!(!is_valid_element(&Value::Null));
    }
}
