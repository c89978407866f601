//! Recognising and unwrapping tracking proxies.

use crate::value::{Key, Value};

/// True if `value` is a proxy carrying the identity tag.
///
/// Plain objects, observable objects and non-objects are never proxies.
pub fn is_reactive_proxy(value: &Value) -> bool {
    match value {
        Value::Object(object) => object.has(Key::original()),
        _ => false,
    }
}

/// The object behind a proxy, or `value` itself when it is not one.
pub fn get_original(value: &Value) -> Value {
    if is_reactive_proxy(value) {
        value.get(Key::original())
    } else {
        value.clone()
    }
}

/// Same as [`get_original`]; the name used alongside `use_observable`.
pub fn unwrap(value: &Value) -> Value {
    get_original(value)
}
