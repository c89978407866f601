//! Access-Tracking Proxy
//!
//! A tracking proxy reads exactly like the object it wraps. During a render
//! every read through it on an observable target runs as a tracked access
//! of the owning administration, and every object it hands out is itself
//! wrapped, so the reaction ends up observing each property path the render
//! touched.
//!
//! # Read Rules
//!
//! - The identity tag key returns the wrapped target, untracked.
//! - Observable target: the read is tracked. Functions come back wrapped so
//!   that calling them is one tracked access with the target as receiver,
//!   and whatever they return is wrapped. Other values are wrapped.
//! - Plain target: the read is not tracked. Functions come back bound to the
//!   target. Objects are wrapped unless the property is fixed (non-writable
//!   and non-configurable), in which case the raw object is returned.
//!
//! Outside render nothing is wrapped, so values escaping into event
//! handlers are the real objects.

use std::sync::{Arc, Weak};

use super::admin::AdminInner;
use super::identity::get_original;
use crate::config::config;
use crate::error::Result;
use crate::value::{Function, Key, Object, ProxyHandler, Value};

/// Read interception for one administration.
struct TrackingHandler {
    admin: Weak<AdminInner>,
}

/// Wrap `value` for `admin`, or return it unchanged when outside render or
/// when it is not an object.
///
/// Proxies are keyed by their target, so one of this administration's own
/// proxies comes back as itself, while a proxy handed over from another
/// administration is rewrapped around its target.
pub(super) fn make_reactive_proxy(admin: &Arc<AdminInner>, value: Value) -> Value {
    if !admin.in_render() {
        return value;
    }
    let Value::Object(target) = get_original(&value) else {
        return value;
    };

    let mut cache = admin.cache.lock();
    let proxy = cache.entry(target.addr()).or_insert_with(|| {
        let handler = Arc::new(TrackingHandler {
            admin: Arc::downgrade(admin),
        });
        Object::proxy(target.clone(), handler)
    });
    Value::Object(proxy.clone())
}

impl TrackingHandler {
    /// A function that calls `original` on `owner` as one tracked access.
    fn tracked_function(admin: &Arc<AdminInner>, owner: &Object, original: Function) -> Function {
        let cached = |admin: &Arc<AdminInner>| {
            let weak = Arc::downgrade(admin);
            let receiver = Value::Object(owner.clone());
            let body = original.clone();
            Function::new(original.name(), move |_this, args: &[Value]| -> Result<Value> {
                let Some(admin) = weak.upgrade() else {
                    return body.call(&receiver, args);
                };
                let args: Vec<Value> = if admin.in_render() {
                    args.to_vec()
                } else {
                    args.iter().map(get_original).collect()
                };
                let result = admin.track_access(|| body.call(&receiver, &args))?;
                Ok(make_reactive_proxy(&admin, result))
            })
        };
        Self::function_for(admin, owner, &original, true, cached)
    }

    /// `original` with `owner` as its fixed receiver.
    fn bound_function(admin: &Arc<AdminInner>, owner: &Object, original: Function) -> Function {
        let receiver = Value::Object(owner.clone());
        Self::function_for(admin, owner, &original, false, |_| original.bind(receiver.clone()))
    }

    fn function_for(
        admin: &Arc<AdminInner>,
        owner: &Object,
        original: &Function,
        tracked: bool,
        make: impl FnOnce(&Arc<AdminInner>) -> Function,
    ) -> Function {
        if !config().cache_bound_functions {
            return make(admin);
        }

        let key = (owner.addr(), original.addr(), tracked);
        if let Some((_, wrapper)) = admin.functions.lock().get(&key) {
            return wrapper.clone();
        }
        let wrapper = make(admin);
        admin
            .functions
            .lock()
            .entry(key)
            .or_insert_with(|| (original.clone(), wrapper))
            .1
            .clone()
    }
}

impl ProxyHandler for TrackingHandler {
    fn get(&self, target: &Object, key: &Key) -> Value {
        if key.is_original() {
            return Value::Object(target.clone());
        }
        let Some(admin) = self.admin.upgrade() else {
            return target.get(key);
        };

        if target.is_observable() {
            return match admin.track_access(|| target.get(key)) {
                Value::Function(function) => {
                    Value::Function(Self::tracked_function(&admin, target, function))
                }
                value => make_reactive_proxy(&admin, value),
            };
        }

        match target.get(key) {
            Value::Function(function) => Value::Function(Self::bound_function(&admin, target, function)),
            value @ Value::Object(_) if target.property_flags(key).is_some_and(|flags| flags.is_fixed()) => {
                value
            }
            value => make_reactive_proxy(&admin, value),
        }
    }

    fn has(&self, target: &Object, key: &Key) -> bool {
        if key.is_original() {
            return true;
        }
        match self.admin.upgrade() {
            Some(admin) if target.is_observable() => admin.track_access(|| target.has(key)),
            _ => target.has(key),
        }
    }

    fn own_keys(&self, target: &Object) -> Vec<Key> {
        match self.admin.upgrade() {
            Some(admin) if target.is_observable() => admin.track_access(|| target.keys()),
            _ => target.keys(),
        }
    }

    fn len(&self, target: &Object) -> usize {
        match self.admin.upgrade() {
            Some(admin) if target.is_observable() => admin.track_access(|| target.len()),
            _ => target.len(),
        }
    }

    fn set(&self, target: &Object, key: Key, value: Value) -> Result<()> {
        target.set(key, get_original(&value))
    }

    fn push(&self, target: &Object, value: Value) -> Result<usize> {
        target.push(get_original(&value))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
