//! Configuration management for derpiwall
//!
//! Settings are loaded in layers:
//! 1. Default values (embedded in structs)
//! 2. TOML settings file
//! 3. Environment variables (highest priority)
//!
//! and then served at runtime by a [`ConfigStore`], which persists every
//! write before returning so the next start sees what the last run set.
//!
//! # Usage
//!
//! ```no_run
//! use derpiwall::config::{ConfigKey, ConfigValue, ConfigStore};
//!
//! let store = ConfigStore::load(None).expect("Failed to load configuration");
//! store
//!     .set(ConfigKey::EnableAutoRefresh, ConfigValue::Flag(true))
//!     .expect("Failed to persist configuration");
//! ```
//!
//! # Environment Variables
//!
//! Fields can be overridden with `DERPIWALL__<FIELD>`, for example
//! `DERPIWALL__SEARCH_STRING=safe,landscape` or
//! `DERPIWALL__AUTO_REFRESH_INTERVAL_SECONDS=60`.
//!
//! # Settings File
//!
//! By default the file lives in the per-user config directory under
//! `DerpiWallpaper/config.toml`. Override it with `DERPIWALL_CONFIG`.

mod models;
mod sources;
mod store;
mod validation;

pub use models::{ConfigKey, ConfigValue, Settings};
pub use sources::config_path;
pub use store::ConfigStore;
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write configuration to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: String,
    },

    #[error("Configuration key {key} does not accept a {actual} value")]
    TypeMismatch {
        key: &'static str,
        actual: &'static str,
    },
}

impl Settings {
    /// Load settings from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let settings = sources::load(path)?;
        validation::validate(&settings)?;
        Ok(settings)
    }
}

impl ConfigStore {
    /// Load settings from the resolved settings file and serve them
    ///
    /// Environment overrides apply in memory; the file keeps its own values.
    pub fn load(explicit_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = sources::config_path(explicit_path);
        let effective = Settings::load(&path)?;
        let file = sources::load_file_layer(&path)?;
        ConfigStore::open_layered(file, effective, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_store_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let folder = temp_dir.path().join("walls");

        let toml_content = format!(
            "search_string = \"safe,space\"\nwallpaper_folder = \"{}\"\nwallpapers_to_keep = 3\n",
            folder.display()
        );
        fs::write(&config_path, toml_content).unwrap();

        let store = ConfigStore::load(Some(config_path.clone())).unwrap();
        assert_eq!(store.search_string(), "safe,space");
        assert_eq!(store.get(ConfigKey::WallpapersToKeep), ConfigValue::Count(3));
        assert_eq!(store.path(), Some(config_path.as_path()));
    }

    #[test]
    fn test_validation_rejects_zero_retention() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "wallpapers_to_keep = 0\n").unwrap();

        let result = ConfigStore::load(Some(config_path));
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidRetention(0))
        ));
    }
}
