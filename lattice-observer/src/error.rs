//! Error types for the dynamic object model.
//!
//! Reads never fail: a missing property is `Value::Undefined`. Writes and
//! calls return [`Result`].

use thiserror::Error;

use crate::value::Key;

/// Errors raised by writes and calls on [`Object`](crate::value::Object)s.
#[derive(Debug, Error)]
pub enum ObserveError {
    /// Write to a frozen object, a non-writable property or a getter.
    #[error("cannot assign to read-only property `{key}`")]
    ReadOnly { key: Key },

    /// New property on an object that does not accept new keys.
    #[error("cannot add property `{key}`, object is not extensible")]
    NotExtensible { key: Key },

    /// List write past the end.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// `call_method` on a property that does not hold a function.
    #[error("property `{key}` is not a function")]
    NotAFunction { key: Key },

    /// List operation on a record.
    #[error("object is not a list")]
    NotAList,

    /// A method received arguments it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ObserveError>;
