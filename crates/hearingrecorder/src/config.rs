//! Configuration management for hearingrecorder.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reader::DEFAULT_LIMIT;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "hearingrecorder";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "hearing_tests.db";

/// Default session file name.
const SESSION_FILE_NAME: &str = "session";

/// Longest accepted session lifetime, ten years.
const MAX_SESSION_TTL_HOURS: u32 = 24 * 365 * 10;

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "HEARINGRECORDER_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `HEARINGRECORDER_`, sections
///    separated by `__`, e.g. `HEARINGRECORDER_HISTORY__DEFAULT_LIMIT`)
/// 2. TOML config file at `~/.config/hearingrecorder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// History view configuration.
    pub history: HistoryConfig,
    /// Session configuration.
    pub session: SessionConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/hearingrecorder/hearing_tests.db`
    pub database_path: Option<PathBuf>,
}

/// History view configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of records shown when `--limit` is not given.
    pub default_limit: usize,
}

/// Session-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a new session stays valid.
    pub ttl_hours: u32,
    /// Where the signed-in session token is kept.
    /// Defaults to `~/.local/share/hearingrecorder/session`
    pub session_file: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            session_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file).nested())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.history.default_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "history.default_limit must be greater than 0".to_string(),
            });
        }

        if self.session.ttl_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "session.ttl_hours must be greater than 0".to_string(),
            });
        }

        if self.session.ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(Error::ConfigValidation {
                message: format!(
                    "session.ttl_hours ({}) cannot be greater than {MAX_SESSION_TTL_HOURS}",
                    self.session.ttl_hours
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the session file path, resolving defaults if not set.
    #[must_use]
    pub fn session_file_path(&self) -> PathBuf {
        self.session
            .session_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SESSION_FILE_NAME))
    }

    /// Get the session lifetime.
    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.session.ttl_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.history.default_limit, 3);
        assert_eq!(config.session.ttl_hours, 24);
        assert!(config.session.session_file.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_default_limit() {
        let mut config = Config::default();
        config.history.default_limit = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_limit"));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = Config::default();
        config.session.ttl_hours = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("ttl_hours"));
    }

    #[test]
    fn test_validate_ttl_upper_bound() {
        let mut config = Config::default();
        config.session.ttl_hours = MAX_SESSION_TTL_HOURS;
        assert!(config.validate().is_ok());

        config.session.ttl_hours = u32::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("ttl_hours"));
        assert!(err.contains("87600"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("hearing_tests.db"));
        assert!(path.to_string_lossy().contains("hearingrecorder"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_session_file_path_default() {
        let path = Config::default().session_file_path();
        assert!(path.ends_with("hearingrecorder/session"));
    }

    #[test]
    fn test_session_ttl() {
        let mut config = Config::default();
        config.session.ttl_hours = 2;
        assert_eq!(config.session_ttl(), chrono::Duration::hours(2));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("hearingrecorder"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_figment_layers_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [history]
                default_limit = 5

                [storage]
                database_path = "/tmp/from-toml.db"
                "#,
            )?;
            jail.set_env("HEARINGRECORDER_SESSION__TTL_HOURS", "48");

            let config: Config = Config::figment(std::path::Path::new("config.toml")).extract()?;
            assert_eq!(config.history.default_limit, 5);
            assert_eq!(config.session.ttl_hours, 48);
            assert_eq!(
                config.database_path(),
                PathBuf::from("/tmp/from-toml.db")
            );
            Ok(())
        });
    }

    #[test]
    fn test_history_config_deserialize() {
        let json = r#"{"default_limit": 10}"#;
        let history: HistoryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(history.default_limit, 10);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("default_limit"));
        assert!(json.contains("ttl_hours"));
    }
}
