//! Dynamic Values
//!
//! The observer works over a dynamic object graph: records, lists,
//! functions and host elements, all reachable from a root store.
//!
//! # Identity
//!
//! Objects, functions and elements are reference types. Two values compare
//! equal only if they point at the same allocation, so a proxy never equals
//! the object it wraps. Primitives compare by value.
//!
//! # Proxies
//!
//! An [`Object`] is either a target (it owns its storage) or a proxy (a
//! target plus a [`ProxyHandler`] that intercepts reads). Every operation on
//! `Object` dispatches on that distinction, so callers use proxies exactly
//! like the objects they wrap.

mod element;
mod function;
mod object;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use element::Element;
pub use function::{Function, NativeFn};
pub use object::{Object, ObjectBuilder, PropertyFlags, ProxyHandler};

use crate::error::Result;

/// A getter body. Receives the owning object as `this`.
pub type Getter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A unique property key that user code cannot spell as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u64);

impl Symbol {
    /// The key under which a proxy exposes the object it wraps.
    pub(crate) const ORIGINAL: Symbol = Symbol(0);

    /// Create a fresh symbol, distinct from every other symbol.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::new()
    }
}

/// A property key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(Arc<str>),
    Index(usize),
    Symbol(Symbol),
}

impl Key {
    /// The reserved identity-tag key carried by every observer proxy.
    pub fn original() -> Self {
        Key::Symbol(Symbol::ORIGINAL)
    }

    pub fn is_original(&self) -> bool {
        matches!(self, Key::Symbol(symbol) if *symbol == Symbol::ORIGINAL)
    }

    /// The key as a record property name. Indices are stringified.
    pub(crate) fn record_name(&self) -> Option<Arc<str>> {
        match self {
            Key::Name(name) => Some(name.clone()),
            Key::Index(index) => Some(index.to_string().into()),
            Key::Symbol(_) => None,
        }
    }

    /// The key as a list index. Numeric names are parsed.
    pub(crate) fn list_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(name) => name.parse().ok(),
            Key::Symbol(_) => None,
        }
    }

    pub(crate) fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == "length")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Symbol(symbol) => write!(f, "Symbol({})", symbol.0),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.into())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name.into())
    }
}

impl From<Arc<str>> for Key {
    fn from(name: Arc<str>) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(Object),
    Function(Function),
    /// A host node. Never proxied, never made observable.
    Element(Element),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for objects (records and lists).
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Read a property. Non-objects have no properties.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Value::Object(object) => object.get(key),
            _ => Value::Undefined,
        }
    }

    /// Look up `key` and call it with `self` as receiver.
    pub fn call_method(&self, key: impl Into<Key>, args: &[Value]) -> Result<Value> {
        match self {
            Value::Object(object) => object.call_method(key, args),
            _ => Err(crate::error::ObserveError::NotAFunction { key: key.into() }),
        }
    }

    /// A short name for the value's type, used in debug output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(object) if object.is_list() => "list",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Element(_) => "element",
        }
    }

    /// Build a plain (non-observable) value from JSON.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                Value::Object(Object::list(items.into_iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => {
                let mut builder = ObjectBuilder::new("Object");
                for (key, value) in map {
                    builder = builder.field(key, Value::from_json(value));
                }
                Value::Object(builder.build())
            }
        }
    }

    /// Parse a JSON document into a plain value.
    pub fn parse_json(text: &str) -> Result<Value> {
        Ok(Value::from_json(serde_json::from_str(text)?))
    }

    /// Snapshot the value as JSON. Functions, elements and cyclic revisits
    /// become `null`; getters are evaluated.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, visiting: &mut HashSet<usize>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Element(_) => {
                serde_json::Value::Null
            }
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Object(object) => {
                if !visiting.insert(object.addr()) {
                    return serde_json::Value::Null;
                }
                let json = if object.is_list() {
                    serde_json::Value::Array(
                        object.values().iter().map(|v| v.to_json_inner(visiting)).collect(),
                    )
                } else {
                    let mut map = serde_json::Map::new();
                    for key in object.keys() {
                        map.insert(key.to_string(), object.get(&key).to_json_inner(visiting));
                    }
                    serde_json::Value::Object(map)
                };
                visiting.remove(&object.addr());
                json
            }
        }
    }
}

fn is_whole(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

fn number_to_json(n: f64) -> serde_json::Value {
    if is_whole(n) {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn format_number(n: f64) -> String {
    if is_whole(n) {
        format!("{}", n as i64)
    } else if n.is_nan() {
        "NaN".to_string()
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Object(object) if object.is_list() => {
                let parts: Vec<String> = object.values().iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(","))
            }
            Value::Object(object) => write!(f, "[object {}]", object.debug_name()),
            Value::Function(function) => write!(f, "function {}()", function.name()),
            Value::Element(element) => write!(f, "<{}>", element.tag()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(object) => write!(f, "{object:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Element(a), Value::Element(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Value::Function(function)
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Value::Element(element)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Object(Object::list(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_render_like_integers_when_whole() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Value::from_json(json!({ "x": 1 }));
        let b = Value::from_json(json!({ "x": 1 }));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn json_bridge_keeps_structure() {
        let doc = json!({ "name": "root", "items": [1, 2, { "deep": true }] });
        let value = Value::from_json(doc.clone());

        assert_eq!(value.get("name"), Value::from("root"));
        assert_eq!(value.get("items").get(2usize).get("deep"), Value::from(true));
        assert_eq!(value.to_json(), doc);
    }

    #[test]
    fn cyclic_json_snapshot_terminates() {
        let value = Value::from_json(json!({ "a": 1 }));
        let object = value.as_object().cloned().unwrap();
        object.set("me", value.clone()).unwrap();

        assert_eq!(value.to_json(), json!({ "a": 1, "me": null }));
    }

    #[test]
    fn parse_json_reports_errors() {
        assert!(Value::parse_json("{ nope").is_err());
        assert_eq!(Value::parse_json("[1,2]").unwrap().to_string(), "1,2");
    }

    #[test]
    fn original_key_is_reserved() {
        assert!(Key::original().is_original());
        assert!(!Key::Symbol(Symbol::new()).is_original());
        assert!(!Key::from("original").is_original());
    }
}
