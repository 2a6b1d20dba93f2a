use super::models::Settings;
use config::{ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "DERPIWALL_CONFIG";
const APP_DIR_NAME: &str = "DerpiWallpaper";
const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_PREFIX: &str = "DERPIWALL";
const ENV_SEPARATOR: &str = "__";

/// Resolve where the settings file lives
///
/// Priority: explicit path, then `DERPIWALL_CONFIG`, then the per-user config dir.
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Load settings from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(config_path: &Path) -> Result<Settings, ConfigError> {
    // Missing .env is the normal case
    let _ = dotenvy::dotenv();

    load_from_sources(config_path)
}

/// Load settings from a specific path and the environment
pub fn load_from_sources(config_path: &Path) -> Result<Settings, ConfigError> {
    build(config_path, true)
}

/// Defaults plus the TOML file only; this is the table that gets persisted
pub fn load_file_layer(config_path: &Path) -> Result<Settings, ConfigError> {
    build(config_path, false)
}

fn build(config_path: &Path, with_env: bool) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        if with_env {
            tracing::info!("Loading configuration from: {}", config_path.display());
        }
        builder = builder.add_source(
            File::from(config_path.to_path_buf())
                .format(FileFormat::Toml)
                .required(false),
        );
    } else if with_env {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    if with_env {
        // DERPIWALL__SEARCH_STRING -> search_string
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );
    }

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let settings = load_from_sources(&config_path).unwrap();
        assert_eq!(settings.auto_refresh_interval_seconds, 360);
        assert_eq!(settings.wallpapers_to_keep, 100);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
search_string = "safe,landscape"
enable_auto_refresh = true
auto_refresh_interval_seconds = 60
wallpapers_to_keep = 12
wallpaper_folder = "/srv/wallpapers"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = load_from_sources(&config_path).unwrap();
        assert_eq!(settings.search_string, "safe,landscape");
        assert!(settings.enable_auto_refresh);
        assert_eq!(settings.auto_refresh_interval_seconds, 60);
        assert_eq!(settings.wallpapers_to_keep, 12);
        assert_eq!(settings.wallpaper_folder, PathBuf::from("/srv/wallpapers"));
        // untouched fields keep their defaults
        assert_eq!(
            settings.derpibooru_json_api_url,
            "https://derpibooru.org/api/v1/json/"
        );
    }

    #[test]
    fn test_config_path_prefers_explicit() {
        let explicit = PathBuf::from("/tmp/custom.toml");
        assert_eq!(config_path(Some(explicit.clone())), explicit);
    }
}
