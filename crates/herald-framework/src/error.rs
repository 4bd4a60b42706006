//! Error types for the Herald framework.

use thiserror::Error;

pub use tower::BoxError;

/// Errors that can occur while extracting handler arguments.
///
/// An extraction failure aborts the handler call and turns the dispatch into
/// a failed one.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// No value was stored under the key.
    #[error("no value stored under context key '{key}'")]
    MissingContext {
        /// The requested key.
        key: String,
    },

    /// A value was stored under the key, but with another type.
    #[error("context key '{key}' does not hold a '{expected}'")]
    TypeMismatch {
        /// The requested key.
        key: String,
        /// Expected type name.
        expected: &'static str,
    },

    /// The event has no originating user.
    #[error("event '{event}' has no sender")]
    MissingSender {
        /// Event name.
        event: &'static str,
    },

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingContext { key: key.into() }
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;
