//! Startup configuration read from the environment.
//!
//! # Invariants
//! - Backend URL and public key are both required; absence is a startup
//!   error reported before any component is constructed.
//! - Logging settings are optional; file logging is enabled only when a log
//!   directory is configured.

use crate::logging::{default_log_level, LogConfig};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const BACKEND_URL_ENV: &str = "TASKLANE_BACKEND_URL";
pub const BACKEND_KEY_ENV: &str = "TASKLANE_BACKEND_ANON_KEY";
pub const LOG_LEVEL_ENV: &str = "TASKLANE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "TASKLANE_LOG_DIR";

const SQLITE_MEMORY_URL: &str = "sqlite::memory:";
const SQLITE_FILE_PREFIX: &str = "sqlite://";

/// Backend connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

/// Backend location resolved from [`BackendConfig::url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    SqliteMemory,
    SqliteFile(PathBuf),
}

/// Whole-process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub logging: Option<LogConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    UnsupportedEndpoint(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "required setting `{name}` is missing or blank"),
            Self::UnsupportedEndpoint(url) => write!(
                f,
                "unsupported backend url `{url}`; expected `{SQLITE_MEMORY_URL}` or `{SQLITE_FILE_PREFIX}<path>`"
            ),
        }
    }
}

impl Error for ConfigError {}

impl BackendConfig {
    /// Reads settings through `lookup`, e.g. `|name| std::env::var(name).ok()`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: required(&lookup, BACKEND_URL_ENV)?,
            anon_key: required(&lookup, BACKEND_KEY_ENV)?,
        })
    }

    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        if self.url == SQLITE_MEMORY_URL {
            return Ok(Endpoint::SqliteMemory);
        }
        match self.url.strip_prefix(SQLITE_FILE_PREFIX) {
            Some(path) if !path.trim().is_empty() => Ok(Endpoint::SqliteFile(PathBuf::from(path))),
            _ => Err(ConfigError::UnsupportedEndpoint(self.url.clone())),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = BackendConfig::from_lookup(&lookup)?;
        backend.endpoint()?;

        let logging = optional(&lookup, LOG_DIR_ENV).map(|dir| LogConfig {
            level: optional(&lookup, LOG_LEVEL_ENV)
                .unwrap_or_else(|| default_log_level().to_string()),
            dir: PathBuf::from(dir),
        });

        Ok(Self { backend, logging })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, name).ok_or(ConfigError::Missing(name))
}

#[cfg(test)]
mod tests {
    use super::{
        AppConfig, ConfigError, Endpoint, BACKEND_KEY_ENV, BACKEND_URL_ENV, LOG_DIR_ENV,
        LOG_LEVEL_ENV,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_backend_settings_are_reported_by_name() {
        let err = AppConfig::from_lookup(lookup(&[])).expect_err("missing url must fail");
        assert_eq!(err, ConfigError::Missing(BACKEND_URL_ENV));

        let err = AppConfig::from_lookup(lookup(&[
            (BACKEND_URL_ENV, "sqlite::memory:"),
            (BACKEND_KEY_ENV, "   "),
        ]))
        .expect_err("blank key must fail");
        assert_eq!(err, ConfigError::Missing(BACKEND_KEY_ENV));
    }

    #[test]
    fn resolves_sqlite_endpoints() {
        let config = AppConfig::from_lookup(lookup(&[
            (BACKEND_URL_ENV, "sqlite:///var/lib/tasklane/dev.sqlite3"),
            (BACKEND_KEY_ENV, "public-anon-key"),
        ]))
        .expect("file endpoint should parse");
        assert_eq!(
            config.backend.endpoint().expect("endpoint"),
            Endpoint::SqliteFile(PathBuf::from("/var/lib/tasklane/dev.sqlite3"))
        );
        assert!(config.logging.is_none());
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = AppConfig::from_lookup(lookup(&[
            (BACKEND_URL_ENV, "https://example.invalid"),
            (BACKEND_KEY_ENV, "public-anon-key"),
        ]))
        .expect_err("https endpoint is not bundled");
        assert!(matches!(err, ConfigError::UnsupportedEndpoint(_)));
    }

    #[test]
    fn logging_enabled_only_with_directory() {
        let config = AppConfig::from_lookup(lookup(&[
            (BACKEND_URL_ENV, "sqlite::memory:"),
            (BACKEND_KEY_ENV, "public-anon-key"),
            (LOG_DIR_ENV, "/tmp/tasklane-logs"),
            (LOG_LEVEL_ENV, "warn"),
        ]))
        .expect("config should parse");
        let logging = config.logging.expect("logging configured");
        assert_eq!(logging.level, "warn");
        assert_eq!(logging.dir, PathBuf::from("/tmp/tasklane-logs"));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = AppConfig::from_lookup(lookup(&[
            (BACKEND_URL_ENV, "sqlite::memory:"),
            (BACKEND_KEY_ENV, "super-secret"),
        ]))
        .expect("config should parse");
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
