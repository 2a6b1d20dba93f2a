use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::ConfigError;

/// Persisted application settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_search_string")]
    pub search_string: String,
    /// Empty key means the public anonymous API
    #[serde(default)]
    pub derpibooru_json_api_key: String,
    #[serde(default = "default_api_url")]
    pub derpibooru_json_api_url: String,
    #[serde(default)]
    pub enable_auto_refresh: bool,
    #[serde(default = "default_auto_refresh_interval_seconds")]
    pub auto_refresh_interval_seconds: u64,
    #[serde(default = "default_wallpapers_to_keep")]
    pub wallpapers_to_keep: u32,
    #[serde(default = "default_wallpaper_folder")]
    pub wallpaper_folder: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_wallpaper_path: Option<PathBuf>,
    /// Set a fresh wallpaper as soon as the workers start
    #[serde(default = "default_refresh_on_startup")]
    pub refresh_on_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_string: default_search_string(),
            derpibooru_json_api_key: String::new(),
            derpibooru_json_api_url: default_api_url(),
            enable_auto_refresh: false,
            auto_refresh_interval_seconds: default_auto_refresh_interval_seconds(),
            wallpapers_to_keep: default_wallpapers_to_keep(),
            wallpaper_folder: default_wallpaper_folder(),
            current_wallpaper_path: None,
            refresh_on_startup: default_refresh_on_startup(),
        }
    }
}

fn default_search_string() -> String {
    "wallpaper,score.gt:200,safe,-anthro,-comic,-human".to_string()
}

fn default_api_url() -> String {
    "https://derpibooru.org/api/v1/json/".to_string()
}

fn default_auto_refresh_interval_seconds() -> u64 {
    360
}

fn default_wallpapers_to_keep() -> u32 {
    100
}

fn default_wallpaper_folder() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(std::env::temp_dir)
        .join("DerpiWallpaper")
}

fn default_refresh_on_startup() -> bool {
    true
}

/// Named settings field, addressable from the command line and the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    SearchString,
    ApiKey,
    ApiUrl,
    EnableAutoRefresh,
    AutoRefreshIntervalSeconds,
    WallpapersToKeep,
    WallpaperFolder,
    CurrentWallpaperPath,
    RefreshOnStartup,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::SearchString,
        ConfigKey::ApiKey,
        ConfigKey::ApiUrl,
        ConfigKey::EnableAutoRefresh,
        ConfigKey::AutoRefreshIntervalSeconds,
        ConfigKey::WallpapersToKeep,
        ConfigKey::WallpaperFolder,
        ConfigKey::CurrentWallpaperPath,
        ConfigKey::RefreshOnStartup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::SearchString => "search_string",
            ConfigKey::ApiKey => "derpibooru_json_api_key",
            ConfigKey::ApiUrl => "derpibooru_json_api_url",
            ConfigKey::EnableAutoRefresh => "enable_auto_refresh",
            ConfigKey::AutoRefreshIntervalSeconds => "auto_refresh_interval_seconds",
            ConfigKey::WallpapersToKeep => "wallpapers_to_keep",
            ConfigKey::WallpaperFolder => "wallpaper_folder",
            ConfigKey::CurrentWallpaperPath => "current_wallpaper_path",
            ConfigKey::RefreshOnStartup => "refresh_on_startup",
        }
    }

    /// Parse a raw command-line value into the type this key stores
    pub fn parse_value(&self, raw: &str) -> Result<ConfigValue, ConfigError> {
        let invalid = |expected: &str| ConfigError::InvalidValue {
            key: self.as_str(),
            value: raw.to_string(),
            expected: expected.to_string(),
        };

        match self {
            ConfigKey::SearchString | ConfigKey::ApiKey | ConfigKey::ApiUrl => {
                Ok(ConfigValue::Text(raw.to_string()))
            }
            ConfigKey::EnableAutoRefresh | ConfigKey::RefreshOnStartup => {
                parse_flag(raw).map(ConfigValue::Flag).ok_or_else(|| invalid("a boolean"))
            }
            ConfigKey::AutoRefreshIntervalSeconds | ConfigKey::WallpapersToKeep => raw
                .trim()
                .parse::<u64>()
                .map(ConfigValue::Count)
                .map_err(|_| invalid("a non-negative integer")),
            ConfigKey::WallpaperFolder => Ok(ConfigValue::Path(Some(PathBuf::from(raw)))),
            ConfigKey::CurrentWallpaperPath => {
                if raw.is_empty() {
                    Ok(ConfigValue::Path(None))
                } else {
                    Ok(ConfigValue::Path(Some(PathBuf::from(raw))))
                }
            }
        }
    }
}

/// Loose boolean parsing matching what people type into ini-style files
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

/// Typed value of a single settings field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Text(String),
    Flag(bool),
    Count(u64),
    Path(Option<PathBuf>),
}

impl ConfigValue {
    fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Text(_) => "text",
            ConfigValue::Flag(_) => "flag",
            ConfigValue::Count(_) => "count",
            ConfigValue::Path(_) => "path",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Text(text) => f.write_str(text),
            ConfigValue::Flag(flag) => write!(f, "{flag}"),
            ConfigValue::Count(count) => write!(f, "{count}"),
            ConfigValue::Path(Some(path)) => write!(f, "{}", path.display()),
            ConfigValue::Path(None) => Ok(()),
        }
    }
}

impl Settings {
    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        match key {
            ConfigKey::SearchString => ConfigValue::Text(self.search_string.clone()),
            ConfigKey::ApiKey => ConfigValue::Text(self.derpibooru_json_api_key.clone()),
            ConfigKey::ApiUrl => ConfigValue::Text(self.derpibooru_json_api_url.clone()),
            ConfigKey::EnableAutoRefresh => ConfigValue::Flag(self.enable_auto_refresh),
            ConfigKey::AutoRefreshIntervalSeconds => {
                ConfigValue::Count(self.auto_refresh_interval_seconds)
            }
            ConfigKey::WallpapersToKeep => ConfigValue::Count(u64::from(self.wallpapers_to_keep)),
            ConfigKey::WallpaperFolder => ConfigValue::Path(Some(self.wallpaper_folder.clone())),
            ConfigKey::CurrentWallpaperPath => ConfigValue::Path(self.current_wallpaper_path.clone()),
            ConfigKey::RefreshOnStartup => ConfigValue::Flag(self.refresh_on_startup),
        }
    }

    /// Assign one field; the value must match the field's type
    pub fn apply(&mut self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError> {
        let mismatch = |value: &ConfigValue| ConfigError::TypeMismatch {
            key: key.as_str(),
            actual: value.kind(),
        };

        match (key, value) {
            (ConfigKey::SearchString, ConfigValue::Text(text)) => self.search_string = text,
            (ConfigKey::ApiKey, ConfigValue::Text(text)) => self.derpibooru_json_api_key = text,
            (ConfigKey::ApiUrl, ConfigValue::Text(text)) => self.derpibooru_json_api_url = text,
            (ConfigKey::EnableAutoRefresh, ConfigValue::Flag(flag)) => {
                self.enable_auto_refresh = flag
            }
            (ConfigKey::RefreshOnStartup, ConfigValue::Flag(flag)) => self.refresh_on_startup = flag,
            (ConfigKey::AutoRefreshIntervalSeconds, ConfigValue::Count(count)) => {
                self.auto_refresh_interval_seconds = count
            }
            (ConfigKey::WallpapersToKeep, ConfigValue::Count(count)) => {
                self.wallpapers_to_keep = u32::try_from(count).map_err(|_| {
                    ConfigError::InvalidValue {
                        key: key.as_str(),
                        value: count.to_string(),
                        expected: "a count that fits in 32 bits".to_string(),
                    }
                })?
            }
            (ConfigKey::WallpaperFolder, ConfigValue::Path(Some(path))) => {
                self.wallpaper_folder = path
            }
            (ConfigKey::CurrentWallpaperPath, ConfigValue::Path(path)) => {
                self.current_wallpaper_path = path
            }
            (_, value) => return Err(mismatch(&value)),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.derpibooru_json_api_url, "https://derpibooru.org/api/v1/json/");
        assert_eq!(settings.auto_refresh_interval_seconds, 360);
        assert_eq!(settings.wallpapers_to_keep, 100);
        assert!(!settings.enable_auto_refresh);
        assert!(settings.derpibooru_json_api_key.is_empty());
        assert!(settings.wallpaper_folder.ends_with("DerpiWallpaper"));
        assert!(settings.current_wallpaper_path.is_none());
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in ConfigKey::ALL {
            assert_eq!(key.as_str().parse::<ConfigKey>().unwrap(), key);
        }
        assert!(matches!(
            "nonsense".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_parse_value_by_key_type() {
        assert_eq!(
            ConfigKey::EnableAutoRefresh.parse_value("YES").unwrap(),
            ConfigValue::Flag(true)
        );
        assert_eq!(
            ConfigKey::WallpapersToKeep.parse_value("25").unwrap(),
            ConfigValue::Count(25)
        );
        assert_eq!(
            ConfigKey::CurrentWallpaperPath.parse_value("").unwrap(),
            ConfigValue::Path(None)
        );
        assert!(ConfigKey::AutoRefreshIntervalSeconds.parse_value("-5").is_err());
        assert!(ConfigKey::RefreshOnStartup.parse_value("maybe").is_err());
    }

    #[test]
    fn test_apply_rejects_type_mismatch() {
        let mut settings = Settings::default();
        let result = settings.apply(ConfigKey::WallpapersToKeep, ConfigValue::Flag(true));

        assert!(matches!(
            result,
            Err(ConfigError::TypeMismatch { key: "wallpapers_to_keep", actual: "flag" })
        ));
        assert_eq!(settings.wallpapers_to_keep, 100);
    }

    #[test]
    fn test_apply_and_get() {
        let mut settings = Settings::default();
        settings
            .apply(ConfigKey::SearchString, ConfigValue::Text("safe,cute".to_string()))
            .unwrap();
        settings
            .apply(ConfigKey::WallpapersToKeep, ConfigValue::Count(5))
            .unwrap();

        assert_eq!(
            settings.get(ConfigKey::SearchString),
            ConfigValue::Text("safe,cute".to_string())
        );
        assert_eq!(settings.get(ConfigKey::WallpapersToKeep), ConfigValue::Count(5));
    }
}
