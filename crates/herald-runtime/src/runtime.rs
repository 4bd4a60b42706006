//! Runtime assembly: configuration in, a ready-to-run pipeline out.
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! let runtime = HeraldRuntime::builder()
//!     .config_file("config/herald.toml")
//!     .build()
//!     .await?;
//!
//! let dispatcher = runtime
//!     .dispatcher()
//!     .include_router(admin_router(runtime.owners()))
//!     .build();
//!
//! runtime.core(dispatcher, transport).run(events).await?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::{ConfigLoader, HeraldConfig, StorageBackend, StorageConfig, validate_config};
use crate::core::DispatchCore;
use crate::error::RuntimeResult;
use crate::logging;
use herald_core::{BoxedTransport, EventCategory, UserId};
use herald_framework::middleware::{L10nMiddleware, ThrottlingMiddleware, WeekendMiddleware};
use herald_framework::{
    BoxedRepository, Dispatcher, DispatcherBuilder, Localization, MemoryRepository, RateLimiter,
};

/// Shared collaborators built from a [`HeraldConfig`].
///
/// Owns the localization provider, the user repository and the rate limiter,
/// and hands out dispatchers pre-wired with the standard outer middlewares.
pub struct HeraldRuntime {
    config: HeraldConfig,
    localization: Arc<Localization>,
    repository: BoxedRepository,
    limiter: Arc<RateLimiter>,
}

impl HeraldRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, initializes logging, loads translations and opens
    /// the repository.
    pub async fn from_config(config: HeraldConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let l10n = &config.localization;
        let localization = Localization::load(
            &l10n.locales_path,
            &l10n.default_locale,
            &l10n.fallback_locale,
        )?;
        info!(
            path = %l10n.locales_path.display(),
            locales = ?localization.locales(),
            "Localization loaded"
        );

        let repository = open_repository(&config.storage).await?;
        let limiter = RateLimiter::new(config.throttling.window(), config.throttling.max_users);

        info!(
            log_level = %config.logging.level,
            storage = ?config.storage.backend,
            weekend = config.weekend.enabled,
            owners = config.bot.owners.len(),
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            localization: Arc::new(localization),
            repository,
            limiter: Arc::new(limiter),
        })
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    pub fn owners(&self) -> &[UserId] {
        &self.config.bot.owners
    }

    pub fn localization(&self) -> &Arc<Localization> {
        &self.localization
    }

    pub fn repository(&self) -> &BoxedRepository {
        &self.repository
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// A dispatcher builder with the standard outer middlewares.
    ///
    /// Per category, in order: weekend black-out (messages and callback
    /// queries, when enabled), localization (all categories), throttling
    /// (messages and callback queries, sharing one limiter). The repository
    /// is seeded as `Shared<BoxedRepository>`.
    pub fn dispatcher(&self) -> DispatcherBuilder {
        let mut builder = Dispatcher::builder();

        let mut throttling = ThrottlingMiddleware::new(Arc::clone(&self.limiter));
        if let Some(message) = &self.config.throttling.message {
            throttling = throttling.with_message(message.clone());
        }

        for category in EventCategory::ALL {
            let limited = category != EventCategory::PreCheckoutQuery;

            if limited && self.config.weekend.enabled {
                builder = builder.outer_middleware(
                    category,
                    WeekendMiddleware::new(self.config.weekend.alert.clone()),
                );
            }
            builder =
                builder.outer_middleware(category, L10nMiddleware::new(Arc::clone(&self.localization)));
            if limited {
                builder = builder.outer_middleware(category, throttling.clone());
            }
        }

        builder.shared(Arc::clone(&self.repository))
    }

    /// Wraps `dispatcher` in a [`DispatchCore`] owning this runtime's
    /// repository and shutdown grace.
    pub fn core(&self, dispatcher: Dispatcher, transport: BoxedTransport) -> DispatchCore {
        DispatchCore::new(dispatcher, transport)
            .with_repository(Arc::clone(&self.repository))
            .with_shutdown_grace(self.config.runtime.shutdown_grace())
    }
}

impl std::fmt::Debug for HeraldRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldRuntime")
            .field("config", &self.config)
            .field("localization", &self.localization)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

async fn open_repository(storage: &StorageConfig) -> RuntimeResult<BoxedRepository> {
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryRepository::new())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            let repository = herald_framework::SqliteRepository::connect(&storage.path).await?;
            info!(path = %storage.path.display(), "SQLite repository opened");
            Ok(Arc::new(repository))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => Err(crate::config::ConfigError::validation(
            "storage.backend = \"sqlite\" requires the `sqlite` feature",
        )
        .into()),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder loading the configuration before creating a [`HeraldRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads, validates and builds.
    pub async fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = self.config_loader.load()?;
        HeraldRuntime::from_config(config).await
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
