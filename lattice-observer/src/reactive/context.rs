//! Reactive Context
//!
//! The reactive context tracks which computation is currently capturing
//! reads. When an atom is observed, it is recorded in the innermost entry of
//! a thread-local stack; the computation that pushed the entry collects the
//! atoms when it finishes.
//!
//! # Implementation
//!
//! When entering a reactive context (running a computed getter or a
//! reaction's tracked function) we push an entry onto the stack. When the
//! returned guard drops, we pop it. Nested contexts are supported: a
//! computed read inside a reaction captures into its own entry, and the
//! reaction only sees the computed's atom.
//!
//! An untracked entry swallows reads, which is how actions and
//! [`untracked`] keep their reads out of any enclosing capture.

use std::cell::RefCell;

use super::subscriber::{AtomId, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The capturing computation, or `None` for an untracked section.
    subscriber_id: Option<SubscriberId>,
    /// Atoms observed while this entry was innermost.
    dependencies: Vec<AtomId>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new capturing context for the given subscriber.
    ///
    /// While this context is innermost, every observed atom is recorded
    /// for the subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a section in which observed atoms are discarded.
    pub fn enter_untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if reads are currently being captured.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current capturing subscriber, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record that the given atom was observed.
    ///
    /// Ignored when no context is active or the innermost one is untracked.
    pub fn track_dependency(atom: AtomId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber_id.is_some() {
                    entry.dependencies.push(atom);
                }
            }
        });
    }

    /// Drain the atoms collected by this context so far.
    ///
    /// Duplicates are removed; first-observation order is kept.
    pub fn take_dependencies(&self) -> Vec<AtomId> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(entry) = stack.last_mut() else {
                return Vec::new();
            };
            debug_assert_eq!(entry.subscriber_id, self.subscriber_id);

            let mut deps = Vec::with_capacity(entry.dependencies.len());
            for atom in entry.dependencies.drain(..) {
                if !deps.contains(&atom) {
                    deps.push(atom);
                }
            }
            deps
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

/// Run `f` without capturing any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_dedups_dependencies() {
        let id = SubscriberId::new();
        let ctx = ReactiveContext::enter(id);
        let (a, b) = (AtomId::new(), AtomId::new());

        ReactiveContext::track_dependency(a);
        ReactiveContext::track_dependency(b);
        ReactiveContext::track_dependency(a);

        assert_eq!(ctx.take_dependencies(), vec![a, b]);
        assert!(ctx.take_dependencies().is_empty());
    }

    #[test]
    fn nested_contexts() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();

        {
            let _ctx1 = ReactiveContext::enter(id1);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(id2);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_section_swallows_reads() {
        let id = SubscriberId::new();
        let ctx = ReactiveContext::enter(id);
        let atom = AtomId::new();

        untracked(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track_dependency(atom);
        });

        assert!(ctx.take_dependencies().is_empty());
    }
}
