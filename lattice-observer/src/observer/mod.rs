//! Observer
//!
//! Bridges observable objects to the host's render lifecycle. A component
//! calls [`use_observable`] with a store and reads through the returned
//! proxy; the reads made during that render become the exact set of
//! properties whose change re-renders the component.
//!
//! # Pieces
//!
//! - [`ObserverAdministration`]: per-usage state. Owns the reaction, the
//!   snapshot token, the host callback and the proxy cache, and is the
//!   external store the host subscribes to.
//! - Tracking proxies: wrap every object reached from the store during
//!   render and route reads through the administration.
//! - [`finalizer`]: best-effort cleanup for usages that never mounted.
//! - [`is_reactive_proxy`], [`get_original`]: recognise and unwrap proxies.

mod admin;
pub mod finalizer;
mod hook;
mod identity;
mod proxy;

pub use admin::{ObserverAdministration, Phase};
pub use hook::use_observable;
pub use identity::{get_original, is_reactive_proxy, unwrap};
