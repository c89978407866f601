//! Host element nodes.
//!
//! Elements are produced by the host's rendering model and compared by
//! identity during reconciliation, so the observer passes them through
//! untouched.

use std::fmt;
use std::sync::Arc;

/// An opaque host node with reference identity.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

struct ElementInner {
    tag: Arc<str>,
    text: Option<Arc<str>>,
}

impl Element {
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                tag: tag.into(),
                text: None,
            }),
        }
    }

    pub fn with_text(tag: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                tag: tag.into(),
                text: Some(text.into()),
            }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn text(&self) -> Option<&str> {
        self.inner.text.as_deref()
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.inner.tag)
            .field("text", &self.inner.text)
            .finish()
    }
}
