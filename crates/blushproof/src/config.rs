//! Configuration management for blushproof.
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
use crate::keys::KeyMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "blushproof";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "blushproof.db";

/// Prefix for environment overrides. Nested keys are separated by `__`,
/// e.g. `BLUSHPROOF_KEYS__MODE=plain`.
const ENV_PREFIX: &str = "BLUSHPROOF_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BLUSHPROOF_`)
/// 2. TOML config file at `~/.config/blushproof/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Key derivation configuration.
    pub keys: KeysConfig,
    /// Shipped list configuration.
    pub lists: ListsConfig,
    /// Telemetry configuration.
    pub telemetry: TelemetryConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/blushproof/blushproof.db`
    pub database_path: Option<PathBuf>,
}

/// Key derivation configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// How list and whitelist keys are derived. Switching from `plain` to
    /// `digest` migrates stored state; the reverse is refused.
    pub mode: KeyMode,
}

/// Shipped list configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListsConfig {
    /// Blushlist file to use instead of the built-in one.
    pub blushlist_path: Option<PathBuf>,
    /// Searchterms file to use instead of the built-in one.
    pub searchterms_path: Option<PathBuf>,
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Forward events to the telemetry channel.
    pub enabled: bool,
    /// Events buffered before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false, // Opt-in only
            queue_capacity: 256,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
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
        if self.telemetry.enabled && self.telemetry.queue_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "telemetry.queue_capacity must be greater than 0".to_string(),
            });
        }

        for (name, path) in [
            ("lists.blushlist_path", &self.lists.blushlist_path),
            ("lists.searchterms_path", &self.lists.searchterms_path),
            ("storage.database_path", &self.storage.database_path),
        ] {
            if let Some(path) = path {
                if path.is_dir() {
                    return Err(Error::ConfigValidation {
                        message: format!("{name} is a directory: {}", path.display()),
                    });
                }
            }
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.keys.mode, KeyMode::Digest);
        assert!(config.lists.blushlist_path.is_none());
        assert!(config.lists.searchterms_path.is_none());
        assert!(!config.telemetry.enabled);
        assert_eq!(config.telemetry.queue_capacity, 256);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_queue_capacity() {
        let mut config = Config::default();
        config.telemetry.queue_capacity = 0;
        assert!(config.validate().is_ok());

        config.telemetry.enabled = true;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("queue_capacity"));
    }

    #[test]
    fn test_validate_list_path_is_directory() {
        let mut config = Config::default();
        config.lists.blushlist_path = Some(std::env::temp_dir());

        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("lists.blushlist_path"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("blushproof.db"));
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
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("blushproof"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_default_data_dir() {
        let path = Config::default_data_dir();
        assert!(path.to_string_lossy().contains("blushproof"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());

        let config = result.unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("blushproof_cfg_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[keys]\nmode = \"plain\"\n\n[telemetry]\nenabled = true\nqueue_capacity = 8\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.keys.mode, KeyMode::Plain);
        assert!(config.telemetry.enabled);
        assert_eq!(config.telemetry.queue_capacity, 8);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_unknown_key_mode() {
        let path = std::env::temp_dir().join(format!("blushproof_badcfg_{}.toml", std::process::id()));
        std::fs::write(&path, "[keys]\nmode = \"rot13\"\n").unwrap();

        let err = Config::load_from(Some(path.clone())).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_toml_lists_and_storage() {
        let path = std::env::temp_dir().join(format!("blushproof_lists_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[lists]\nblushlist_path = \"/srv/lists/blushlist.json\"\n\n[storage]\ndatabase_path = \"/srv/db/profile.db\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(
            config.lists.blushlist_path,
            Some(PathBuf::from("/srv/lists/blushlist.json"))
        );
        assert!(config.lists.searchterms_path.is_none());
        assert_eq!(config.database_path(), PathBuf::from("/srv/db/profile.db"));
        assert_eq!(config.keys.mode, KeyMode::Digest);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_keys_config_deserialize() {
        let keys: KeysConfig = serde_json::from_str(r#"{"mode": "plain"}"#).unwrap();
        assert_eq!(keys.mode, KeyMode::Plain);

        let keys: KeysConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(keys.mode, KeyMode::Digest);
    }

    #[test]
    fn test_telemetry_config_serialize() {
        let telemetry = TelemetryConfig::default();
        let json = serde_json::to_string(&telemetry).unwrap();
        assert!(json.contains("queue_capacity"));
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        let cloned = config.clone();
        assert_eq!(config, cloned);
    }
}
