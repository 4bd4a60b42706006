//! Error types for the Herald core.
//!
//! Framework-level errors (extraction, localization, storage) are defined in
//! `herald-framework`.

use thiserror::Error;

use crate::event::{ChatId, UserId};

/// Errors a [`Transport`](crate::Transport) may report.
///
/// These never abort a dispatch: the dispatch core logs them where the
/// action is delivered, and filters treat failed lookups as non-matching.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never reached the platform.
    #[error("request '{method}' failed: {reason}")]
    RequestFailed {
        /// API method that was attempted.
        method: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// The platform refused the request.
    #[error("platform rejected '{method}': {description}")]
    Rejected {
        /// API method that was attempted.
        method: &'static str,
        /// Description returned by the platform.
        description: String,
    },

    /// Membership lookup for an unknown chat or user.
    #[error("user {user_id} is not known in chat {chat_id}")]
    MemberNotFound { chat_id: ChatId, user_id: UserId },

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    pub fn request_failed(method: &'static str, reason: impl Into<String>) -> Self {
        Self::RequestFailed {
            method,
            reason: reason.into(),
        }
    }

    pub fn rejected(method: &'static str, description: impl Into<String>) -> Self {
        Self::Rejected {
            method,
            description: description.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
