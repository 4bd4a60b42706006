//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    HeraldConfig, LocalizationConfig, LogOutput, LoggingConfig, StorageBackend, StorageConfig,
    ThrottlingConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    if config.bot.token.is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    validate_throttling(&config.throttling)?;
    validate_localization(&config.localization)?;
    validate_logging(&config.logging)?;
    validate_storage(&config.storage)?;
    Ok(())
}

fn validate_throttling(throttling: &ThrottlingConfig) -> ConfigResult<()> {
    if !throttling.rate_limit.is_finite() || throttling.rate_limit <= 0.0 {
        return Err(ConfigError::validation(format!(
            "throttling.rate_limit must be a positive number of seconds, got {}",
            throttling.rate_limit
        )));
    }
    if throttling.max_users == 0 {
        return Err(ConfigError::validation(
            "throttling.max_users must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_localization(localization: &LocalizationConfig) -> ConfigResult<()> {
    if localization.default_locale.trim().is_empty() {
        return Err(ConfigError::missing_field("localization.default_locale"));
    }
    if localization.fallback_locale.trim().is_empty() {
        return Err(ConfigError::missing_field("localization.fallback_locale"));
    }
    if localization.locales_path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("localization.locales_path"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if logging.show_datetime && logging.datetime_format.trim().is_empty() {
        return Err(ConfigError::validation(
            "logging.datetime_format cannot be empty when show_datetime is enabled",
        ));
    }
    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> ConfigResult<()> {
    match storage.backend {
        StorageBackend::Memory => Ok(()),
        StorageBackend::Sqlite if cfg!(feature = "sqlite") => {
            if storage.path.as_os_str().is_empty() {
                return Err(ConfigError::missing_field("storage.path"));
            }
            Ok(())
        }
        StorageBackend::Sqlite => Err(ConfigError::validation(
            "storage.backend = \"sqlite\" requires the `sqlite` feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Secret;

    fn valid() -> HeraldConfig {
        let mut config = HeraldConfig::default();
        config.bot.token = Secret::new("123:abc");
        config
    }

    #[test]
    fn test_validate_defaults_with_token() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_missing_token() {
        let result = validate_config(&HeraldConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingField { field }) if field == "bot.token"));
    }

    #[test]
    fn test_invalid_throttling() {
        let mut config = valid();
        config.throttling.rate_limit = 0.0;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.throttling.max_users = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_sqlite_backend_needs_feature() {
        let mut config = valid();
        config.storage.backend = StorageBackend::Sqlite;
        assert_eq!(validate_config(&config).is_ok(), cfg!(feature = "sqlite"));
    }
}
