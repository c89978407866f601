//! Reactive Primitives
//!
//! This module implements the fine-grained observable system the observer
//! bridge is built on: atoms, computeds and reactions.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An Atom stands for one observable slot (a property, the shape of an
//! object, the contents of a list). Reading the slot inside a capturing
//! context records the atom; writing it reports the atom as changed.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes. Observable objects turn their
//! getters into computeds.
//!
//! ## Reactions
//!
//! A Reaction captures the atoms read inside `track` and runs an effect
//! callback when any of them changes. The observer administration owns one
//! reaction per component usage.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local capture stack to automatically
//! detect dependencies. When an atom is observed, we check if there is an
//! active capture and, if so, record the atom there.

mod atom;
mod computed;
mod context;
mod reaction;
mod runtime;
mod subscriber;

pub use atom::Atom;
pub use computed::{Computed, ComputedState};
pub use context::{untracked, ReactiveContext};
pub use reaction::Reaction;
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use subscriber::{AtomId, SubscriberId};
