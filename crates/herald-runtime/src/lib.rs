//! Herald Runtime - configuration, logging and the event loop.
//!
//! This crate provides:
//! - Layered configuration with figment ([`config`])
//! - `tracing-subscriber` setup driven by that configuration ([`logging`])
//! - [`HeraldRuntime`]: localization, storage and the standard outer
//!   middlewares assembled from a [`HeraldConfig`]
//! - [`DispatchCore`]: concurrent dispatch with per-chat ordering and
//!   graceful shutdown
//!
//! ```ignore
//! use herald_runtime::HeraldRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder().build().await?;
//!     let dispatcher = runtime.dispatcher().include_router(routers()).build();
//!
//!     runtime.core(dispatcher, transport).run(events).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, HeraldConfig, load_config, load_config_from_file,
};
pub use core::{DEFAULT_SHUTDOWN_GRACE, DispatchCore};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{HeraldRuntime, RuntimeBuilder};

// Re-export tracing for use by bot crates
pub use tracing;

/// Logging macros for bot code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
