//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use herald_framework::{L10nError, StorageError};

/// Errors that can occur while building or running a bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Localization error: {0}")]
    Localization(#[from] L10nError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An event was submitted before [`DispatchCore::start`](crate::DispatchCore::start).
    #[error("Dispatch core is not running")]
    NotStarted,

    /// An event was submitted after shutdown began.
    #[error("Dispatch core is shutting down")]
    ShuttingDown,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
