//! Objects: records, lists and proxies.
//!
//! A target object owns its storage behind a lock. Once made observable it
//! carries one [`Atom`] per data property, turns its getters into
//! [`Computed`]s, and has a shape atom for the key set (records) or the
//! contents (lists). Reads report atoms, writes report changes; a plain
//! object does neither.
//!
//! No lock is held while a getter, a computed or a change notification
//! runs, so user code is free to read and write any object, including the
//! one it was called on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{Function, Getter, Key, Value};
use crate::error::{ObserveError, Result};
use crate::reactive::{untracked, Atom, Computed};

/// Interception layer for proxy objects.
///
/// Only reads have no default: a handler decides what `get` and `has`
/// return. Every other operation forwards to the target unless overridden.
pub trait ProxyHandler: Send + Sync {
    fn get(&self, target: &Object, key: &Key) -> Value;

    fn has(&self, target: &Object, key: &Key) -> bool;

    fn own_keys(&self, target: &Object) -> Vec<Key> {
        target.keys()
    }

    fn len(&self, target: &Object) -> usize {
        target.len()
    }

    fn set(&self, target: &Object, key: Key, value: Value) -> Result<()> {
        target.set(key, value)
    }

    fn push(&self, target: &Object, value: Value) -> Result<usize> {
        target.push(value)
    }
}

/// Attributes of a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFlags {
    pub writable: bool,
    pub configurable: bool,
}

impl PropertyFlags {
    pub const DEFAULT: PropertyFlags = PropertyFlags {
        writable: true,
        configurable: true,
    };

    pub const READ_ONLY: PropertyFlags = PropertyFlags {
        writable: false,
        configurable: false,
    };

    /// Frozen or sealed-and-read-only: the value behind it can never change.
    pub fn is_fixed(&self) -> bool {
        !self.writable && !self.configurable
    }
}

impl Default for PropertyFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone)]
enum Slot {
    Data(Value),
    Getter(Getter),
    Computed(Computed),
}

#[derive(Clone)]
struct Property {
    slot: Slot,
    flags: PropertyFlags,
    /// Present once the owning object is observable (data properties only).
    atom: Option<Atom>,
}

impl Property {
    fn data(value: Value, flags: PropertyFlags) -> Self {
        Self {
            slot: Slot::Data(value),
            flags,
            atom: None,
        }
    }
}

enum Slots {
    Record(IndexMap<Arc<str>, Property>),
    List(Vec<Value>),
}

struct TargetState {
    slots: Slots,
    /// Key set / list contents. Present iff the object is observable.
    shape: Option<Atom>,
    frozen: bool,
}

struct Target {
    name: Arc<str>,
    state: RwLock<TargetState>,
}

struct Proxy {
    target: Object,
    handler: Arc<dyn ProxyHandler>,
}

enum ObjectCell {
    Target(Target),
    Proxy(Proxy),
}

/// What a read resolved to once the lock is released.
enum Read {
    Value(Value),
    Getter(Getter),
    Computed(Computed),
}

/// A shared handle to a record, a list, or a proxy of either.
#[derive(Clone)]
pub struct Object(Arc<ObjectCell>);

fn unique_name(base: &str) -> Arc<str> {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("{base}@{}", COUNTER.fetch_add(1, Ordering::Relaxed)).into()
}

impl Object {
    fn from_slots(base: &str, slots: Slots) -> Self {
        Object(Arc::new(ObjectCell::Target(Target {
            name: unique_name(base),
            state: RwLock::new(TargetState {
                slots,
                shape: None,
                frozen: false,
            }),
        })))
    }

    /// An empty plain record.
    pub fn record() -> Self {
        Self::from_slots("Object", Slots::Record(IndexMap::new()))
    }

    /// A plain list.
    pub fn list(items: Vec<Value>) -> Self {
        Self::from_slots("Array", Slots::List(items))
    }

    pub fn builder(name: &str) -> ObjectBuilder {
        ObjectBuilder::new(name)
    }

    /// Wrap `target` so that reads go through `handler`.
    pub fn proxy(target: Object, handler: Arc<dyn ProxyHandler>) -> Self {
        Object(Arc::new(ObjectCell::Proxy(Proxy { target, handler })))
    }

    /// Read a property.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        match &*self.0 {
            // Symbols are never stored on targets.
            ObjectCell::Target(_) if matches!(key, Key::Symbol(_)) => Value::Undefined,
            ObjectCell::Target(target) => self.target_get(target, &key),
            ObjectCell::Proxy(proxy) => proxy.handler.get(&proxy.target, &key),
        }
    }

    /// Check whether a property exists.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match &*self.0 {
            ObjectCell::Target(_) if matches!(key, Key::Symbol(_)) => false,
            ObjectCell::Target(target) => target.has(&key),
            ObjectCell::Proxy(proxy) => proxy.handler.has(&proxy.target, &key),
        }
    }

    /// Write a property. On an observable object the value is made
    /// observable first and readers of the property are notified.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        match &*self.0 {
            ObjectCell::Target(target) => target.set(key, value),
            ObjectCell::Proxy(proxy) => proxy.handler.set(&proxy.target, key, value),
        }
    }

    /// Append to a list, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        match &*self.0 {
            ObjectCell::Target(target) => target.push(value),
            ObjectCell::Proxy(proxy) => proxy.handler.push(&proxy.target, value),
        }
    }

    /// Delete a record property. Returns whether it existed.
    pub fn remove(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        match &*self.0 {
            ObjectCell::Target(target) => target.remove(key),
            ObjectCell::Proxy(proxy) => proxy.target.remove(key),
        }
    }

    /// Property names of a record, or indices of a list.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.0 {
            ObjectCell::Target(target) => target.keys(),
            ObjectCell::Proxy(proxy) => proxy.handler.own_keys(&proxy.target),
        }
    }

    /// Number of properties of a record, or length of a list.
    pub fn len(&self) -> usize {
        match &*self.0 {
            ObjectCell::Target(target) => target.len(),
            ObjectCell::Proxy(proxy) => proxy.handler.len(&proxy.target),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every property value (records) or item (lists), read through `get`.
    pub fn values(&self) -> Vec<Value> {
        self.keys().into_iter().map(|key| self.get(key)).collect()
    }

    /// Look up `key` and call it with this object as receiver.
    pub fn call_method(&self, key: impl Into<Key>, args: &[Value]) -> Result<Value> {
        let key = key.into();
        match self.get(&key) {
            Value::Function(function) => function.call(&Value::Object(self.clone()), args),
            _ => Err(ObserveError::NotAFunction { key }),
        }
    }

    /// Attributes of an own property, without reporting any read.
    pub fn property_flags(&self, key: impl Into<Key>) -> Option<PropertyFlags> {
        let key = key.into();
        match &*self.0 {
            ObjectCell::Target(target) => target.property_flags(&key),
            ObjectCell::Proxy(proxy) => proxy.target.property_flags(key),
        }
    }

    /// Make every property non-writable and non-configurable. Frozen
    /// objects reject writes and are never made observable.
    pub fn freeze(&self) {
        match &*self.0 {
            ObjectCell::Target(target) => target.freeze(),
            ObjectCell::Proxy(proxy) => proxy.target.freeze(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        match &*self.0 {
            ObjectCell::Target(target) => target.state.read().frozen,
            ObjectCell::Proxy(proxy) => proxy.target.is_frozen(),
        }
    }

    pub fn is_list(&self) -> bool {
        match &*self.0 {
            ObjectCell::Target(target) => matches!(target.state.read().slots, Slots::List(_)),
            ObjectCell::Proxy(proxy) => proxy.target.is_list(),
        }
    }

    /// Whether the underlying target is observable.
    pub fn is_observable(&self) -> bool {
        match &*self.0 {
            ObjectCell::Target(target) => target.state.read().shape.is_some(),
            ObjectCell::Proxy(proxy) => proxy.target.is_observable(),
        }
    }

    /// The target's debug name, e.g. `Store@3`.
    pub fn debug_name(&self) -> Arc<str> {
        match &*self.0 {
            ObjectCell::Target(target) => target.name.clone(),
            ObjectCell::Proxy(proxy) => proxy.target.debug_name(),
        }
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the object allocation, stable for its lifetime.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Number of live handles to this allocation.
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// The object a proxy wraps.
    pub(crate) fn proxy_target(&self) -> Option<&Object> {
        match &*self.0 {
            ObjectCell::Target(_) => None,
            ObjectCell::Proxy(proxy) => Some(&proxy.target),
        }
    }

    /// Deeply convert this object (and everything reachable from it) to an
    /// observable one. Cycles are visited once; frozen objects are skipped.
    pub(crate) fn make_observable(&self) {
        let target = match &*self.0 {
            ObjectCell::Target(target) => target,
            ObjectCell::Proxy(proxy) => return proxy.target.make_observable(),
        };

        let children: Vec<Value> = {
            let mut state = target.state.write();
            if state.shape.is_some() || state.frozen {
                return;
            }
            state.shape = Some(Atom::new(format!("{}.<shape>", target.name)));

            match &mut state.slots {
                Slots::Record(props) => {
                    let mut children = Vec::new();
                    for (name, prop) in props.iter_mut() {
                        let atom_name = format!("{}.{}", target.name, name);
                        match &prop.slot {
                            Slot::Data(value) => {
                                children.push(value.clone());
                                prop.atom = Some(Atom::new(atom_name));
                            }
                            Slot::Getter(getter) => {
                                let computed = Computed::new(atom_name, getter.clone());
                                prop.slot = Slot::Computed(computed);
                            }
                            Slot::Computed(_) => {}
                        }
                    }
                    children
                }
                Slots::List(items) => items.clone(),
            }
        };

        for child in children {
            if let Value::Object(object) = child {
                object.make_observable();
            }
        }
    }

    fn target_get(&self, target: &Target, key: &Key) -> Value {
        let read = {
            let state = target.state.read();
            match &state.slots {
                Slots::Record(props) => {
                    let prop = key.record_name().and_then(|name| props.get(&name));
                    match prop {
                        Some(prop) => {
                            if let Some(atom) = &prop.atom {
                                atom.report_observed();
                            }
                            match &prop.slot {
                                Slot::Data(value) => Read::Value(value.clone()),
                                Slot::Getter(getter) => Read::Getter(getter.clone()),
                                Slot::Computed(computed) => Read::Computed(computed.clone()),
                            }
                        }
                        None => {
                            // A later `set` of this key changes the shape.
                            if let Some(shape) = &state.shape {
                                shape.report_observed();
                            }
                            Read::Value(Value::Undefined)
                        }
                    }
                }
                Slots::List(items) => {
                    if let Some(shape) = &state.shape {
                        shape.report_observed();
                    }
                    if key.is_length() {
                        Read::Value(Value::from(items.len()))
                    } else {
                        let item = key.list_index().and_then(|index| items.get(index));
                        Read::Value(item.cloned().unwrap_or_default())
                    }
                }
            }
        };

        match read {
            Read::Value(value) => value,
            Read::Getter(getter) => getter(&Value::Object(self.clone())),
            Read::Computed(computed) => computed.get(&Value::Object(self.clone())),
        }
    }
}

impl Target {
    fn has(&self, key: &Key) -> bool {
        let state = self.state.read();
        match &state.slots {
            Slots::Record(props) => {
                let prop = key.record_name().and_then(|name| props.get(&name));
                match (prop, &state.shape) {
                    (Some(prop), _) => {
                        if let Some(atom) = &prop.atom {
                            atom.report_observed();
                        }
                        true
                    }
                    (None, Some(shape)) => {
                        shape.report_observed();
                        false
                    }
                    (None, None) => false,
                }
            }
            Slots::List(items) => {
                if let Some(shape) = &state.shape {
                    shape.report_observed();
                }
                key.is_length() || key.list_index().is_some_and(|index| index < items.len())
            }
        }
    }

    fn set(&self, key: Key, value: Value) -> Result<()> {
        if self.state.read().shape.is_some() {
            if let Value::Object(object) = &value {
                object.make_observable();
            }
        }

        let changed = {
            let mut state = self.state.write();
            if state.frozen {
                let exists = match &state.slots {
                    Slots::Record(props) => key.record_name().is_some_and(|name| props.contains_key(&name)),
                    Slots::List(items) => key.list_index().is_some_and(|index| index < items.len()),
                };
                return Err(if exists {
                    ObserveError::ReadOnly { key }
                } else {
                    ObserveError::NotExtensible { key }
                });
            }
            let shape = state.shape.clone();

            match &mut state.slots {
                Slots::Record(props) => {
                    let Some(name) = key.record_name() else {
                        return Err(ObserveError::InvalidArgument(format!(
                            "symbol key `{key}` cannot be assigned"
                        )));
                    };
                    match props.get_mut(&name) {
                        Some(prop) => {
                            if !prop.flags.writable {
                                return Err(ObserveError::ReadOnly { key });
                            }
                            match &mut prop.slot {
                                Slot::Data(current) => {
                                    if *current == value {
                                        return Ok(());
                                    }
                                    *current = value;
                                    prop.atom.clone()
                                }
                                Slot::Getter(_) | Slot::Computed(_) => {
                                    return Err(ObserveError::ReadOnly { key });
                                }
                            }
                        }
                        None => {
                            let mut prop = Property::data(value, PropertyFlags::DEFAULT);
                            if shape.is_some() {
                                prop.atom = Some(Atom::new(format!("{}.{}", self.name, name)));
                            }
                            props.insert(name, prop);
                            shape
                        }
                    }
                }
                Slots::List(items) => {
                    let len = items.len();
                    match key.list_index() {
                        Some(index) if index < len => {
                            if items[index] == value {
                                return Ok(());
                            }
                            items[index] = value;
                        }
                        Some(index) if index == len => items.push(value),
                        Some(index) => return Err(ObserveError::IndexOutOfBounds { index, len }),
                        None => return Err(ObserveError::ReadOnly { key }),
                    }
                    shape
                }
            }
        };

        if let Some(atom) = changed {
            atom.report_changed();
        }
        Ok(())
    }

    fn push(&self, value: Value) -> Result<usize> {
        if self.state.read().shape.is_some() {
            if let Value::Object(object) = &value {
                object.make_observable();
            }
        }

        let (len, shape) = {
            let mut state = self.state.write();
            if state.frozen {
                let len = match &state.slots {
                    Slots::List(items) => items.len(),
                    Slots::Record(_) => return Err(ObserveError::NotAList),
                };
                return Err(ObserveError::NotExtensible { key: Key::Index(len) });
            }
            let shape = state.shape.clone();
            let Slots::List(items) = &mut state.slots else {
                return Err(ObserveError::NotAList);
            };
            items.push(value);
            (items.len(), shape)
        };

        if let Some(shape) = shape {
            shape.report_changed();
        }
        Ok(len)
    }

    fn remove(&self, key: Key) -> Result<bool> {
        let removed = {
            let mut state = self.state.write();
            if state.frozen {
                return Err(ObserveError::ReadOnly { key });
            }
            let shape = state.shape.clone();
            let Slots::Record(props) = &mut state.slots else {
                return Err(ObserveError::InvalidArgument(format!(
                    "cannot delete `{key}` from a list"
                )));
            };
            let Some(name) = key.record_name() else {
                return Ok(false);
            };
            match props.get(&name) {
                Some(prop) if !prop.flags.configurable => {
                    return Err(ObserveError::ReadOnly { key });
                }
                Some(_) => props.shift_remove(&name).map(|prop| (prop.atom, shape)),
                None => None,
            }
        };

        match removed {
            Some((atom, shape)) => {
                if let Some(atom) = atom {
                    atom.report_changed();
                }
                if let Some(shape) = shape {
                    shape.report_changed();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self) -> Vec<Key> {
        let state = self.state.read();
        if let Some(shape) = &state.shape {
            shape.report_observed();
        }
        match &state.slots {
            Slots::Record(props) => props.keys().map(|name| Key::Name(name.clone())).collect(),
            Slots::List(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    fn len(&self) -> usize {
        let state = self.state.read();
        if let Some(shape) = &state.shape {
            shape.report_observed();
        }
        match &state.slots {
            Slots::Record(props) => props.len(),
            Slots::List(items) => items.len(),
        }
    }

    fn property_flags(&self, key: &Key) -> Option<PropertyFlags> {
        let state = self.state.read();
        match &state.slots {
            Slots::Record(props) => key
                .record_name()
                .and_then(|name| props.get(&name))
                .map(|prop| prop.flags),
            Slots::List(items) => {
                key.list_index().filter(|index| *index < items.len())?;
                Some(if state.frozen {
                    PropertyFlags::READ_ONLY
                } else {
                    PropertyFlags::DEFAULT
                })
            }
        }
    }

    fn freeze(&self) {
        let mut state = self.state.write();
        state.frozen = true;
        if let Slots::Record(props) = &mut state.slots {
            for prop in props.values_mut() {
                prop.flags = PropertyFlags::READ_ONLY;
            }
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ObjectCell::Target(target) => f
                .debug_struct("Object")
                .field("name", &target.name)
                .field("observable", &self.is_observable())
                .finish(),
            ObjectCell::Proxy(proxy) => f.debug_tuple("Proxy").field(&proxy.target).finish(),
        }
    }
}

/// Builder for named records with fields, getters and methods.
///
/// # Example
///
/// ```rust,ignore
/// let store = ObjectBuilder::new("Store")
///     .field("a", 1)
///     .field("b", 2)
///     .getter("sum", |this| Value::from(num(this, "a") + num(this, "b")))
///     .action("setA", |this, args| { this.as_object().unwrap().set("a", args[0].clone())?; Ok(Value::Undefined) })
///     .build();
/// ```
pub struct ObjectBuilder {
    base: String,
    props: IndexMap<Arc<str>, Property>,
}

impl ObjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            base: name.to_string(),
            props: IndexMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.props
            .insert(name.into(), Property::data(value.into(), PropertyFlags::DEFAULT));
        self
    }

    /// A non-writable, non-configurable data property.
    pub fn fixed(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.props
            .insert(name.into(), Property::data(value.into(), PropertyFlags::READ_ONLY));
        self
    }

    /// A getter. It becomes a cached computed once the object is observable.
    pub fn getter<F>(mut self, name: impl Into<Arc<str>>, getter: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.props.insert(
            name.into(),
            Property {
                slot: Slot::Getter(Arc::new(getter)),
                flags: PropertyFlags::DEFAULT,
                atom: None,
            },
        );
        self
    }

    /// A method. Reads inside it are captured by whoever calls it.
    pub fn method<F>(self, name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let function = Function::new(name.clone(), body);
        self.field(name, function)
    }

    /// A method whose reads are never captured.
    pub fn action<F>(self, name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.method(name, move |this, args| untracked(|| body(this, args)))
    }

    pub fn build(self) -> Object {
        Object::from_slots(&self.base, Slots::Record(self.props))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Reaction;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Reaction, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let reaction = Reaction::new("test", move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        (reaction, fired)
    }

    #[test]
    fn plain_record_reads_and_writes() {
        let object = ObjectBuilder::new("Plain").field("a", 1).build();

        assert_eq!(object.get("a"), Value::from(1));
        assert!(object.has("a"));
        assert!(!object.has("b"));

        object.set("b", "two").unwrap();
        assert_eq!(object.keys(), vec![Key::from("a"), Key::from("b")]);
        assert!(!object.is_observable());
    }

    #[test]
    fn observable_write_notifies_readers_of_that_key_only() {
        let object = ObjectBuilder::new("Store").field("a", 1).field("b", 2).build();
        object.make_observable();
        let (reaction, fired) = counter();

        reaction.track(|| object.get("a"));

        object.set("b", 3).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        object.set("a", 5).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Same value, no notification.
        object.set("a", 5).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn adding_a_key_notifies_missing_key_readers() {
        let object = Object::record();
        object.make_observable();
        let (reaction, fired) = counter();

        reaction.track(|| object.get("later"));
        object.set("later", true).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn list_push_notifies_length_readers() {
        let list = Object::list(vec![Value::from(1)]);
        list.make_observable();
        let (reaction, fired) = counter();

        reaction.track(|| list.len());
        assert_eq!(list.push(2).unwrap(), 2);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(list.get("length"), Value::from(2));
        assert_eq!(list.get(1usize), Value::from(2));
    }

    #[test]
    fn observable_is_deep_and_cycle_safe() {
        let child = ObjectBuilder::new("Child").field("name", "c").build();
        let parent = ObjectBuilder::new("Parent").field("child", child.clone()).build();
        child.set("parent", parent.clone()).unwrap();

        parent.make_observable();

        assert!(parent.is_observable());
        assert!(child.is_observable());
    }

    #[test]
    fn values_assigned_to_observables_become_observable() {
        let store = Object::record();
        store.make_observable();
        let nested = Object::list(vec![]);

        store.set("items", nested.clone()).unwrap();
        assert!(nested.is_observable());
    }

    #[test]
    fn getters_become_cached_computeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let store = ObjectBuilder::new("Store")
            .field("a", 2)
            .getter("double", move |this| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Value::from(this.get("a").as_f64().unwrap_or(0.0) * 2.0)
            })
            .build();
        store.make_observable();

        assert_eq!(store.get("double"), Value::from(4));
        assert_eq!(store.get("double"), Value::from(4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.set("a", 3).unwrap();
        assert_eq!(store.get("double"), Value::from(6));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn frozen_objects_reject_writes_and_stay_plain() {
        let object = ObjectBuilder::new("Frozen").field("a", 1).build();
        object.freeze();
        object.make_observable();

        assert!(!object.is_observable());
        assert!(matches!(object.set("a", 2), Err(ObserveError::ReadOnly { .. })));
        assert!(matches!(object.set("b", 2), Err(ObserveError::NotExtensible { .. })));
        assert_eq!(object.property_flags("a"), Some(PropertyFlags::READ_ONLY));
    }

    #[test]
    fn getter_properties_are_read_only() {
        let object = ObjectBuilder::new("G").getter("g", |_| Value::Null).build();
        assert!(matches!(object.set("g", 1), Err(ObserveError::ReadOnly { .. })));
    }

    #[test]
    fn list_write_past_end_fails() {
        let list = Object::list(vec![]);
        let err = list.set(3usize, 1).unwrap_err();
        assert!(matches!(err, ObserveError::IndexOutOfBounds { index: 3, len: 0 }));
    }

    #[test]
    fn remove_reports_key_and_shape() {
        let store = ObjectBuilder::new("Store").field("a", 1).build();
        store.make_observable();
        let (reaction, fired) = counter();

        reaction.track(|| store.keys());
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn action_reads_are_not_captured() {
        let store = ObjectBuilder::new("Store")
            .field("a", 1)
            .action("readA", |this, _| Ok(this.get("a")))
            .build();
        store.make_observable();
        let (reaction, _) = counter();

        let value = reaction.track(|| store.call_method("readA", &[]).unwrap());

        assert_eq!(value, Value::from(1));
        // Only the method property itself was observed.
        assert_eq!(reaction.observing().len(), 1);
    }

    #[test]
    fn call_method_on_data_fails() {
        let store = ObjectBuilder::new("Store").field("a", 1).build();
        assert!(matches!(
            store.call_method("a", &[]),
            Err(ObserveError::NotAFunction { .. })
        ));
    }
}
