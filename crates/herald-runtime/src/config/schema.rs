//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use herald_core::UserId;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub throttling: ThrottlingConfig,

    #[serde(default)]
    pub weekend: WeekendConfig,

    #[serde(default)]
    pub localization: LocalizationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// A secret string; never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

/// Bot identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Platform token. Required.
    #[serde(default)]
    pub token: Secret,

    /// Owner user ids: a list, a single id, or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_owners")]
    pub owners: Vec<UserId>,
}

fn deserialize_owners<'de, D>(deserializer: D) -> Result<Vec<UserId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Owners {
        List(Vec<UserId>),
        One(UserId),
        Text(String),
    }

    match Owners::deserialize(deserializer)? {
        Owners::List(ids) => Ok(ids),
        Owners::One(id) => Ok(vec![id]),
        Owners::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<UserId>()
                    .map_err(|_| serde::de::Error::custom(format!("invalid owner id '{part}'")))
            })
            .collect(),
    }
}

// =============================================================================
// Throttling / weekend
// =============================================================================

/// Per-user rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlingConfig {
    /// Window in seconds during which a user is admitted at most once.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Maximum number of users tracked at once.
    #[serde(default = "default_max_users")]
    pub max_users: usize,

    /// Text sent to throttled users; silent when unset.
    #[serde(default)]
    pub message: Option<String>,
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            max_users: default_max_users(),
            message: None,
        }
    }
}

impl ThrottlingConfig {
    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit).unwrap_or(Duration::ZERO)
    }
}

fn default_rate_limit() -> f64 {
    0.5
}

fn default_max_users() -> usize {
    10_000
}

/// Weekend black-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekendConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Alert shown to users pressing buttons on weekends.
    #[serde(default = "default_weekend_alert")]
    pub alert: String,
}

impl Default for WeekendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            alert: default_weekend_alert(),
        }
    }
}

fn default_weekend_alert() -> String {
    "The bot is off on weekends.".to_string()
}

// =============================================================================
// Localization
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizationConfig {
    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default = "default_locale")]
    pub fallback_locale: String,

    /// Directory holding one sub-directory of `.ftl` files per locale.
    #[serde(default = "default_locales_path")]
    pub locales_path: PathBuf,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            fallback_locale: default_locale(),
            locales_path: default_locales_path(),
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_locales_path() -> PathBuf {
    PathBuf::from("l10n")
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "critical" => Ok(Self::Error),
            other => Err(format!(
                "unknown log level '{other}', expected one of trace, debug, info, warn, error"
            )),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogRenderer {
    /// Human-readable lines.
    #[default]
    Console,
    /// One JSON object per line (requires the `json-log` feature).
    Json,
}

impl LogRenderer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Json => "json",
        }
    }
}

impl TryFrom<String> for LogRenderer {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "console" | "text" | "pretty" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown log renderer '{other}', expected 'console' or 'json'"
            )),
        }
    }
}

impl From<LogRenderer> for String {
    fn from(renderer: LogRenderer) -> Self {
        renderer.as_str().to_string()
    }
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub renderer: LogRenderer,

    /// Prefix lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_datetime: bool,

    /// chrono `strftime` format of the timestamp.
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,

    /// Render timestamps in UTC instead of local time.
    #[serde(default)]
    pub time_in_utc: bool,

    /// ANSI colours (console renderer only).
    #[serde(default = "default_true")]
    pub use_colors: bool,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file; required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-module levels, e.g. `{ "herald_framework" = "debug" }`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            renderer: LogRenderer::default(),
            show_datetime: true,
            datetime_format: default_datetime_format(),
            time_in_utc: false,
            use_colors: true,
            output: LogOutput::default(),
            file_path: None,
            filters: HashMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

// =============================================================================
// Runtime / storage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Seconds in-flight events get to finish on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl RuntimeConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_shutdown_grace() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    /// Requires the `sqlite` feature.
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file for the `sqlite` backend.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("herald.db")
}
