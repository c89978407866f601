//! Atom Implementation
//!
//! An atom is the smallest observable unit: it holds no value, it only
//! reports reads and writes. Observable objects own one atom per property
//! plus one for their shape (the key set of a record, the length of a list).
//!
//! # How Atoms Work
//!
//! 1. When an atom is observed inside a capturing context, the context
//!    records its ID.
//!
//! 2. When the capture finishes, the capturing computation subscribes to
//!    the atom through the [`Runtime`].
//!
//! 3. When the owner of the atom mutates the value it stands for, it calls
//!    [`Atom::report_changed`] and every subscriber is notified.

use std::fmt;
use std::sync::Arc;

use super::runtime::Runtime;
use super::subscriber::AtomId;

/// An observable unit identified by an [`AtomId`].
#[derive(Clone)]
pub struct Atom {
    id: AtomId,
    name: Arc<str>,
}

impl Atom {
    /// Create a new atom with a debug name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: AtomId::new(),
            name: name.into(),
        }
    }

    /// Get the atom's unique ID.
    pub fn id(&self) -> AtomId {
        self.id
    }

    /// Get the atom's debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a read of this atom in the current capture.
    pub fn report_observed(&self) {
        Runtime::report_observed(self.id);
    }

    /// Notify every subscriber that the value behind this atom changed.
    pub fn report_changed(&self) {
        tracing::trace!(atom = %self.name, "atom changed");
        Runtime::report_changed(self.id);
    }

    /// Number of computeds and reactions currently observing this atom.
    pub fn observer_count(&self) -> usize {
        Runtime::observer_count(self.id)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
