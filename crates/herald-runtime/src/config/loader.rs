//! Layered configuration loading.
//!
//! Sources, later ones winning:
//!
//! 1. [`HeraldConfig::default`]
//! 2. values passed to [`ConfigLoader::merge`]
//! 3. `herald.{profile}.toml`, then `herald.toml` (or `config.toml`) from the
//!    first search path that has one; `.yaml`/`.yml` with `yaml-config`
//! 4. `HERALD_*` environment variables, `__` separating sections
//!
//! An explicit file, from [`ConfigLoader::file`] or `CONFIG_FILE_PATH`,
//! replaces step 3 and must exist.
//!
//! ```text
//! HERALD_BOT__TOKEN=123:abc
//! HERALD_BOT__OWNERS=1,2
//! HERALD_THROTTLING__RATE_LIMIT=0.5
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HeraldConfig;
use super::validation::validate_config;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE_PATH";

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "HERALD_PROFILE";

const ENV_PREFIX: &str = "HERALD_";

/// Selects the `herald.{profile}.*` overlay file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `HERALD_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A config file format compiled into this build.
#[derive(Debug, Clone, Copy)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    const ENABLED: &'static [FileFormat] = &[
        #[cfg(feature = "toml-config")]
        FileFormat::Toml,
        #[cfg(feature = "yaml-config")]
        FileFormat::Yaml,
    ];

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Some(Self::Toml),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// `(stem, extension)` pairs searched in each directory, in order.
    fn candidates(self) -> &'static [(&'static str, &'static str)] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &[("herald", "toml"), ("config", "toml")],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &[
                ("herald", "yaml"),
                ("herald", "yml"),
                ("config", "yaml"),
                ("config", "yml"),
            ],
        }
    }

    fn merge(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// Builder for a [`HeraldConfig`].
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .with_current_dir()
///     .profile("production")
///     .load()?;
/// ```
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a directory to look for config files in.
    ///
    /// With no search paths, the current directory and `~/.config/herald`
    /// are used.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match user_config_dir() {
            Some(dir) => self.search_path(dir),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Ignores `HERALD_*` variables and `CONFIG_FILE_PATH`.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers `config` over the defaults, below any file or env value.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads and validates the configuration.
    pub fn load(self) -> ConfigResult<HeraldConfig> {
        let config = self.extract()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Loads the configuration without validating it.
    pub fn extract(self) -> ConfigResult<HeraldConfig> {
        let profile = self.profile.clone();
        let config: HeraldConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            log_level = %config.logging.level,
            owners = config.bot.owners.len(),
            "Configuration extracted"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let overrides = std::mem::take(&mut self.overrides);
        let mut figment = Figment::from(Serialized::defaults(HeraldConfig::default())).merge(overrides);

        match self.explicit_file() {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path));
                }
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                let format = FileFormat::from_extension(ext)
                    .ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))?;
                info!(path = %path.display(), "Loading configuration file");
                figment = format.merge(figment, &path);
            }
            None => figment = self.search_files(figment),
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Merging environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    fn explicit_file(&self) -> Option<PathBuf> {
        if self.config_file.is_some() || !self.load_env {
            return self.config_file.clone();
        }
        std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from)
    }

    /// Per format, merges the profile overlay and base file from the first
    /// search path holding a base file.
    fn search_files(&self, mut figment: Figment) -> Figment {
        let dirs: Vec<PathBuf> = if self.search_paths.is_empty() {
            std::env::current_dir()
                .ok()
                .into_iter()
                .chain(user_config_dir())
                .collect()
        } else {
            self.search_paths.clone()
        };

        let mut found = false;
        for format in FileFormat::ENABLED.iter().copied() {
            'dirs: for dir in &dirs {
                for (stem, ext) in format.candidates() {
                    let base = dir.join(format!("{stem}.{ext}"));
                    if !base.exists() {
                        continue;
                    }

                    let overlay = dir.join(format!("{stem}.{}.{ext}", self.profile));
                    if overlay.exists() {
                        debug!(path = %overlay.display(), profile = %self.profile, "Loading profile config");
                        figment = format.merge(figment, &overlay);
                    }
                    info!(path = %base.display(), "Loading configuration file");
                    figment = format.merge(figment, &base);
                    found = true;
                    break 'dirs;
                }
            }
        }

        if !found {
            warn!(paths = ?dirs, "No configuration file found, using defaults");
        }
        figment
    }
}

fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("herald"))
}

/// Loads and validates the configuration from the default locations.
pub fn load_config() -> ConfigResult<HeraldConfig> {
    ConfigLoader::new().load()
}

/// Loads and validates the configuration from `path`, with env overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<HeraldConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogLevel, StorageBackend};
    use std::fs;

    fn empty_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_default_config() {
        let dir = empty_dir();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .extract()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.localization.default_locale, "en");
        assert_eq!(config.throttling.max_users, 10_000);
    }

    #[test]
    fn test_missing_token_rejected() {
        let dir = empty_dir();
        let err = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "bot.token"));
    }

    #[test]
    fn test_explicit_file_not_found() {
        let dir = empty_dir();
        let err = ConfigLoader::new()
            .file(dir.path().join("absent.toml"))
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_load_toml_file() {
        let dir = empty_dir();
        fs::write(
            dir.path().join("herald.toml"),
            r#"
[bot]
token = "123:abc"
owners = "10, 20"

[throttling]
rate_limit = 1.5

[logging]
level = "DEBUG"

[storage]
backend = "memory"
"#,
        )
        .unwrap();

        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.bot.token.expose(), "123:abc");
        assert_eq!(config.bot.owners, vec![10, 20]);
        assert_eq!(config.throttling.rate_limit, 1.5);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_merged_under_base() {
        let dir = empty_dir();
        fs::write(
            dir.path().join("herald.production.toml"),
            "[weekend]\nenabled = true\n[bot]\ntoken = \"profile\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("herald.toml"), "[bot]\ntoken = \"base\"\n").unwrap();

        let config = ConfigLoader::new()
            .profile("prod")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert!(config.weekend.enabled);
        assert_eq!(config.bot.token.expose(), "base");
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_first_directory_with_base_file_wins() {
        let empty = empty_dir();
        let first = empty_dir();
        let second = empty_dir();
        fs::write(first.path().join("config.toml"), "[bot]\ntoken = \"first\"\n").unwrap();
        fs::write(second.path().join("herald.toml"), "[bot]\ntoken = \"second\"\n").unwrap();

        let config = ConfigLoader::new()
            .search_path(empty.path())
            .search_path(first.path())
            .search_path(second.path())
            .without_env()
            .load()
            .unwrap();
        assert_eq!(config.bot.token.expose(), "first");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = empty_dir();
        let path = dir.path().join("herald.ini");
        fs::write(&path, "").unwrap();
        let err = ConfigLoader::new().file(&path).without_env().load().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn test_profile_from_env() {
        // SAFETY: This test is single-threaded and we clean up immediately after
        unsafe {
            std::env::set_var(PROFILE_ENV, "production");
        }
        let profile = Profile::from_env();
        assert_eq!(profile, Profile::Production);
        unsafe {
            std::env::remove_var(PROFILE_ENV);
        }
    }
}
