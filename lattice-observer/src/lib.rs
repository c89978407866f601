//! Lattice Observer
//!
//! This crate lets components re-render exactly when something they read
//! changes. It implements:
//!
//! - A dynamic object model (records, lists, functions, host elements)
//! - Observable objects built on fine-grained atoms, computeds and reactions
//! - Access-tracking proxies that record every property a render reads
//! - An observer administration that ties one reaction to one component
//!   usage across mount, re-render, remount and unmount
//! - A small synchronous host used to drive components
//!
//! # Architecture
//!
//! - `reactive`: atoms, computeds, reactions and the runtime linking them
//! - `value`: dynamic values, objects and proxies
//! - `observable`: turning object graphs observable
//! - `observer`: the tracking proxy, its administration and `use_observable`
//! - `host`: render hooks, external stores and the host scheduler
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_observer::{observable, use_observable, Host, ObjectBuilder, Value};
//!
//! let store = observable(
//!     ObjectBuilder::new("Store")
//!         .field("a", 1)
//!         .field("b", 2)
//!         .build(),
//! );
//!
//! let host = Host::new();
//! let component = {
//!     let store = store.clone();
//!     host.mount(move |cx| use_observable(cx, &store).get("a").to_string())
//! };
//!
//! store.as_object().unwrap().set("b", 3)?;  // not read, no re-render
//! store.as_object().unwrap().set("a", 5)?;
//! host.flush();
//! assert_eq!(component.output(), "5");
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod observable;
pub mod observer;
pub mod reactive;
pub mod value;

pub use config::{configure, ObserverConfig};
pub use error::{ObserveError, Result};
pub use host::{
    is_valid_element, ComponentHandle, ExternalStore, Host, RenderContext, RenderHooks,
    StateVersion, StoreCallback, Unsubscribe,
};
pub use observable::{is_observable, observable};
pub use observer::{
    get_original, is_reactive_proxy, unwrap, use_observable, ObserverAdministration, Phase,
};
pub use value::{Element, Function, Key, Object, ObjectBuilder, Value};
