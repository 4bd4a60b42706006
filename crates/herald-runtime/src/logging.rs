//! Logging setup for Herald bots.
//!
//! Built on `tracing-subscriber`. Levels come from `RUST_LOG` when set,
//! otherwise from [`LoggingConfig::level`] plus the per-module
//! [`LoggingConfig::filters`].
//!
//! ```rust,ignore
//! use herald_runtime::config::load_config;
//! use herald_runtime::logging;
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use herald_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("herald_framework=trace")
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogOutput, LogRenderer, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// A builder for configuring logging.
///
/// ```rust,ignore
/// LoggingBuilder::new()
///     .renderer(LogRenderer::Json)
///     .output(LogOutput::Stderr)
///     .time_in_utc(true)
///     .init();
/// ```
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    renderer: LogRenderer,
    output: LogOutput,
    file_path: Option<PathBuf>,
    show_datetime: bool,
    datetime_format: String,
    time_in_utc: bool,
    use_colors: bool,
    with_target: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        let defaults = LoggingConfig::default();
        Self {
            directives: Vec::new(),
            level: None,
            renderer: defaults.renderer,
            output: defaults.output,
            file_path: None,
            show_datetime: defaults.show_datetime,
            datetime_format: defaults.datetime_format,
            time_in_utc: defaults.time_in_utc,
            use_colors: defaults.use_colors,
            with_target: true,
        }
    }

    /// Creates a builder from a [`LoggingConfig`].
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new();

        builder.level = Some(config.level.to_tracing_level());
        builder.renderer = config.renderer;
        builder.output = config.output;
        builder.file_path.clone_from(&config.file_path);
        builder.show_datetime = config.show_datetime;
        builder.datetime_format.clone_from(&config.datetime_format);
        builder.time_in_utc = config.time_in_utc;
        builder.use_colors = config.use_colors;

        // Sorted so the resulting filter does not depend on map order
        let mut modules: Vec<_> = config.filters.iter().collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        for (module, level) in modules {
            builder.directives.push(format!("{module}={}", level.as_str()));
        }

        builder
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a filter directive such as `herald_framework=debug`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn renderer(mut self, renderer: LogRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Sets the log file and switches output to it.
    pub fn file_path(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self.output = LogOutput::File;
        self
    }

    pub fn show_datetime(mut self, enabled: bool) -> Self {
        self.show_datetime = enabled;
        self
    }

    pub fn datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = format.into();
        self
    }

    pub fn time_in_utc(mut self, enabled: bool) -> Self {
        self.time_in_utc = enabled;
        self
    }

    pub fn use_colors(mut self, enabled: bool) -> Self {
        self.use_colors = enabled;
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base_level = self.level.unwrap_or(tracing::Level::INFO);
        let base_filter = base_level.to_string().to_lowercase();

        // RUST_LOG wins over the configured level
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base_filter));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("ignoring invalid log directive '{directive}': {e}"),
            }
        }

        filter
    }

    /// Initializes the logging system, ignoring a second initialization.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Tries to initialize the logging system.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let layer = match self.output {
            LogOutput::Stdout => self.layer(std::io::stdout),
            LogOutput::Stderr => self.layer(std::io::stderr),
            LogOutput::File => match &self.file_path {
                Some(path) => {
                    let appender = tracing_appender::rolling::never(
                        path.parent()
                            .filter(|p| !p.as_os_str().is_empty())
                            .unwrap_or_else(|| Path::new(".")),
                        path.file_name().unwrap_or_else(|| OsStr::new("herald.log")),
                    );
                    self.layer(appender)
                }
                None => {
                    eprintln!("log output 'file' has no file_path, falling back to stdout");
                    self.layer(std::io::stdout)
                }
            },
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
    }

    fn layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
    {
        macro_rules! with_timer {
            ($layer:expr) => {
                if !self.show_datetime {
                    $layer.without_time().boxed()
                } else if self.time_in_utc {
                    $layer
                        .with_timer(ChronoUtc::new(self.datetime_format.clone()))
                        .boxed()
                } else {
                    $layer
                        .with_timer(ChronoLocal::new(self.datetime_format.clone()))
                        .boxed()
                }
            };
        }

        #[cfg(feature = "json-log")]
        if self.renderer == LogRenderer::Json {
            return with_timer!(
                fmt::layer()
                    .json()
                    .with_target(self.with_target)
                    .with_writer(writer)
            );
        }
        #[cfg(not(feature = "json-log"))]
        if self.renderer == LogRenderer::Json {
            tracing::warn!("JSON log renderer requires the `json-log` feature, using console");
        }

        let colors = self.use_colors && self.output != LogOutput::File;
        with_timer!(
            fmt::layer()
                .with_ansi(colors)
                .with_target(self.with_target)
                .with_writer(writer)
        )
    }
}
