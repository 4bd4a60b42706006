//! Configuration for Herald bots.
//!
//! Settings are layered with figment: built-in defaults, then a TOML (or
//! YAML) file, then `HERALD_*` environment variables. See [`ConfigLoader`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, HeraldConfig, LocalizationConfig, LogLevel, LogOutput, LogRenderer, LoggingConfig,
    RuntimeConfig, Secret, StorageBackend, StorageConfig, ThrottlingConfig, WeekendConfig,
};
pub use validation::validate_config;
