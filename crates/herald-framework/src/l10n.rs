//! Localization provider backed by Fluent.
//!
//! Translations are loaded once at startup from a directory laid out as
//!
//! ```text
//! l10n/
//! ├── en/
//! │   └── bot.ftl
//! └── ru/
//!     └── bot.ftl
//! ```
//!
//! and are immutable afterwards. [`L10nMiddleware`](crate::middleware::L10nMiddleware)
//! picks a locale once per request and stores an [`L10n`] handle in the
//! request context, from where handlers extract it.
//!
//! Lookups fall back from the requested locale to its language part
//! (`pt-BR` → `pt`), then to the default locale, then to the fallback locale.
//! A key missing everywhere is an error; the key itself is never shown to
//! users.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fluent_bundle::FluentResource;
use fluent_bundle::concurrent::FluentBundle;
use thiserror::Error;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

use crate::context::{DispatchRequest, L10N_KEY};
use crate::error::ExtractResult;
use crate::extractor::FromRequest;

pub use fluent_bundle::{FluentArgs, FluentValue};

/// Errors raised while loading or formatting translations.
#[derive(Debug, Error)]
pub enum L10nError {
    /// The key is not translated in any candidate locale.
    #[error("missing translation for '{key}' (locale '{locale}')")]
    MissingTranslation { key: String, locale: String },

    #[error("locales directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("locales path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("no locales found in {0}")]
    NoLocales(PathBuf),

    #[error("invalid locale identifier '{0}'")]
    InvalidLocale(String),

    /// The configured default or fallback locale has no translations.
    #[error("locale '{0}' is not available")]
    UnknownLocale(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },
}

type Bundle = FluentBundle<FluentResource>;

/// All loaded translations.
pub struct Localization {
    bundles: HashMap<String, Bundle>,
    default_locale: String,
    fallback_locale: String,
}

impl Localization {
    /// Loads every `<dir>/<locale>/*.ftl` file.
    pub fn load(
        dir: impl AsRef<Path>,
        default_locale: &str,
        fallback_locale: &str,
    ) -> Result<Self, L10nError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(L10nError::DirectoryNotFound(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(L10nError::NotADirectory(dir.to_path_buf()));
        }

        let mut locale_dirs = list_dir(dir)?
            .into_iter()
            .filter(|path| path.is_dir())
            .collect::<Vec<_>>();
        locale_dirs.sort();

        let mut sources = Vec::new();
        for locale_dir in locale_dirs {
            let Some(locale) = locale_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let mut files = list_dir(&locale_dir)?
                .into_iter()
                .filter(|path| path.extension().is_some_and(|ext| ext == "ftl"))
                .collect::<Vec<_>>();
            files.sort();

            for file in files {
                let source = fs::read_to_string(&file).map_err(|source| L10nError::Io {
                    path: file.clone(),
                    source,
                })?;
                debug!(locale, file = %file.display(), "Loaded translation file");
                sources.push((locale.to_string(), file.display().to_string(), source));
            }
        }

        if sources.is_empty() {
            return Err(L10nError::NoLocales(dir.to_path_buf()));
        }
        Self::build(default_locale, fallback_locale, sources)
    }

    /// Builds a provider from in-memory `(locale, ftl source)` pairs.
    pub fn from_sources<I, L, S>(
        default_locale: &str,
        fallback_locale: &str,
        sources: I,
    ) -> Result<Self, L10nError>
    where
        I: IntoIterator<Item = (L, S)>,
        L: Into<String>,
        S: Into<String>,
    {
        let sources = sources
            .into_iter()
            .map(|(locale, source)| {
                let locale = locale.into();
                let origin = format!("<{locale}>");
                (locale, origin, source.into())
            })
            .collect();
        Self::build(default_locale, fallback_locale, sources)
    }

    fn build(
        default_locale: &str,
        fallback_locale: &str,
        sources: Vec<(String, String, String)>,
    ) -> Result<Self, L10nError> {
        let mut bundles: HashMap<String, Bundle> = HashMap::new();

        for (locale, origin, source) in sources {
            let resource = FluentResource::try_new(source).map_err(|(_, errors)| {
                L10nError::Parse {
                    origin: origin.clone(),
                    message: render_errors(&errors),
                }
            })?;

            let bundle = match bundles.get_mut(&locale) {
                Some(bundle) => bundle,
                None => {
                    let langid: LanguageIdentifier = locale
                        .parse()
                        .map_err(|_| L10nError::InvalidLocale(locale.clone()))?;
                    let mut bundle = FluentBundle::new_concurrent(vec![langid]);
                    bundle.set_use_isolating(false);
                    bundles.entry(locale.clone()).or_insert(bundle)
                }
            };

            bundle
                .add_resource(resource)
                .map_err(|errors| L10nError::Parse {
                    origin,
                    message: render_errors(&errors),
                })?;
        }

        for locale in [default_locale, fallback_locale] {
            if !bundles.contains_key(locale) {
                return Err(L10nError::UnknownLocale(locale.to_string()));
            }
        }

        Ok(Self {
            bundles,
            default_locale: default_locale.to_string(),
            fallback_locale: fallback_locale.to_string(),
        })
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    /// Loaded locales, sorted.
    pub fn locales(&self) -> Vec<&str> {
        let mut locales: Vec<&str> = self.bundles.keys().map(String::as_str).collect();
        locales.sort_unstable();
        locales
    }

    pub fn supports(&self, locale: &str) -> bool {
        self.bundles.contains_key(locale)
    }

    /// Picks the best loaded locale for a client language tag.
    pub fn negotiate(&self, requested: Option<&str>) -> &str {
        if let Some(code) = requested {
            if let Some((key, _)) = self.bundles.get_key_value(code) {
                return key;
            }
            let language = code.split(['-', '_']).next().unwrap_or(code);
            if let Some((key, _)) = self.bundles.get_key_value(language) {
                return key;
            }
        }
        &self.default_locale
    }

    /// Formats `key` in `locale` (`None` = default locale).
    pub fn format(&self, key: &str, locale: Option<&str>) -> Result<String, L10nError> {
        self.format_inner(key, locale, None)
    }

    /// Formats `key` with Fluent arguments.
    pub fn format_with(
        &self,
        key: &str,
        locale: Option<&str>,
        args: &FluentArgs<'_>,
    ) -> Result<String, L10nError> {
        self.format_inner(key, locale, Some(args))
    }

    fn format_inner(
        &self,
        key: &str,
        locale: Option<&str>,
        args: Option<&FluentArgs<'_>>,
    ) -> Result<String, L10nError> {
        let primary = self.negotiate(locale);
        let candidates = [primary, &self.default_locale, &self.fallback_locale];

        for (i, candidate) in candidates.iter().enumerate() {
            if candidates[..i].contains(candidate) {
                continue;
            }
            let Some(bundle) = self.bundles.get(*candidate) else {
                continue;
            };
            let Some(pattern) = bundle.get_message(key).and_then(|m| m.value()) else {
                continue;
            };

            let mut errors = Vec::new();
            let text = bundle.format_pattern(pattern, args, &mut errors);
            if !errors.is_empty() {
                warn!(key, locale = candidate, errors = %render_errors(&errors), "Translation formatted with errors");
            }
            return Ok(text.into_owned());
        }

        Err(L10nError::MissingTranslation {
            key: key.to_string(),
            locale: primary.to_string(),
        })
    }
}

impl std::fmt::Debug for Localization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Localization")
            .field("locales", &self.locales())
            .field("default_locale", &self.default_locale)
            .field("fallback_locale", &self.fallback_locale)
            .finish()
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, L10nError> {
    let entries = fs::read_dir(dir).map_err(|source| L10nError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(entries.filter_map(Result::ok).map(|e| e.path()).collect())
}

fn render_errors<E: std::fmt::Debug>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| format!("{e:?}"))
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// L10n handle
// =============================================================================

/// The provider bound to the locale chosen for one request.
#[derive(Clone)]
pub struct L10n {
    provider: Arc<Localization>,
    locale: String,
}

impl L10n {
    pub fn new(provider: Arc<Localization>, locale: impl Into<String>) -> Self {
        Self {
            provider,
            locale: locale.into(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn format(&self, key: &str) -> Result<String, L10nError> {
        self.provider.format(key, Some(&self.locale))
    }

    pub fn format_with(&self, key: &str, args: &FluentArgs<'_>) -> Result<String, L10nError> {
        self.provider.format_with(key, Some(&self.locale), args)
    }
}

impl std::fmt::Debug for L10n {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L10n").field("locale", &self.locale).finish()
    }
}

impl FromRequest for L10n {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        request.context().try_get::<L10n>(L10N_KEY).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Localization {
        Localization::from_sources(
            "en",
            "en",
            [
                ("en", "hello = Hello!\nonly-en = English only\ngreet = Hi, { $name }!"),
                ("ru", "hello = Привет!\ngreet = Привет, { $name }!"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_format_in_requested_locale() {
        let l10n = provider();
        assert_eq!(l10n.format("hello", Some("ru")).unwrap(), "Привет!");
        assert_eq!(l10n.format("hello", None).unwrap(), "Hello!");
    }

    #[test]
    fn test_region_falls_back_to_language() {
        let l10n = provider();
        assert_eq!(l10n.negotiate(Some("ru-RU")), "ru");
        assert_eq!(l10n.negotiate(Some("de")), "en");
        assert_eq!(l10n.negotiate(None), "en");
    }

    #[test]
    fn test_missing_key_falls_back_then_errors() {
        let l10n = provider();
        assert_eq!(l10n.format("only-en", Some("ru")).unwrap(), "English only");
        assert!(matches!(
            l10n.format("nope", Some("ru")),
            Err(L10nError::MissingTranslation { .. })
        ));
    }

    #[test]
    fn test_format_with_args() {
        let l10n = L10n::new(Arc::new(provider()), "ru");
        let mut args = FluentArgs::new();
        args.set("name", "Аня");
        assert_eq!(l10n.format_with("greet", &args).unwrap(), "Привет, Аня!");
    }

    #[test]
    fn test_unknown_default_locale() {
        let err = Localization::from_sources("de", "en", [("en", "a = b")]).unwrap_err();
        assert!(matches!(err, L10nError::UnknownLocale(locale) if locale == "de"));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("en")).unwrap();
        fs::create_dir(dir.path().join("ru")).unwrap();
        fs::write(dir.path().join("en/bot.ftl"), "hello = Hello!\n").unwrap();
        fs::write(dir.path().join("en/extra.ftl"), "bye = Bye!\n").unwrap();
        fs::write(dir.path().join("ru/bot.ftl"), "hello = Привет!\n").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let l10n = Localization::load(dir.path(), "en", "en").unwrap();
        assert_eq!(l10n.locales(), vec!["en", "ru"]);
        assert_eq!(l10n.format("bye", Some("ru")).unwrap(), "Bye!");
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Localization::load(dir.path().join("absent"), "en", "en").unwrap_err();
        assert!(matches!(err, L10nError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_parse_error_reported() {
        let err = Localization::from_sources("en", "en", [("en", "= broken")]).unwrap_err();
        assert!(matches!(err, L10nError::Parse { .. }));
    }
}
