//! Making values observable.
//!
//! `observable` converts an object graph in place: every data property gets
//! an atom, every getter becomes a [`Computed`](crate::reactive::Computed),
//! and every object and list gets a shape atom. Reads inside a
//! [`Reaction`](crate::reactive::Reaction) capture are then recorded, and
//! writes notify exactly the reactions that read the written property.

use crate::value::Value;

/// Deeply make `value` observable and return it.
///
/// Objects are converted in place, so existing handles observe too. Cycles
/// are visited once, frozen objects are left alone, and proxies convert the
/// object they wrap. Primitives, functions and elements are returned as is.
pub fn observable(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(object) = &value {
        object.make_observable();
    }
    value
}

/// Whether `value` is an object whose target has been made observable.
pub fn is_observable(value: &Value) -> bool {
    match value {
        Value::Object(object) => object.is_observable(),
        _ => false,
    }
}

/// Debug label for a value: the target's name for objects, the type name
/// otherwise.
pub fn debug_name(value: &Value) -> String {
    match value {
        Value::Object(object) => object.debug_name().to_string(),
        Value::Function(function) => function.name().to_string(),
        other => other.type_name().to_string(),
    }
}
