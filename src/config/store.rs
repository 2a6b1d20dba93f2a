use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use super::models::{ConfigKey, ConfigValue, Settings};
use super::{validation, ConfigError};

/// File table plus the table the application runs with
///
/// `effective` is `file` with environment overrides applied. Only `file` is
/// ever written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layers {
    file: Settings,
    effective: Settings,
}

/// Shared, persisted settings service
///
/// Reads hand out owned values from the effective table; every `set` validates
/// the result and writes the file table to disk before returning. Environment
/// overrides stay in memory. Clones share the same underlying settings.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Layers>>,
    /// Serializes writers so the disk write happens outside `inner`'s lock
    writer: Arc<Mutex<()>>,
    path: Option<Arc<PathBuf>>,
}

impl ConfigStore {
    /// Wrap settings persisted at `path`, writing any missing defaults out
    pub fn open(settings: Settings, path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::open_layered(settings.clone(), settings, path)
    }

    /// Like [`ConfigStore::open`], with `effective` carrying environment
    /// overrides on top of the `file` table
    pub fn open_layered(
        file: Settings,
        effective: Settings,
        path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        validation::validate(&effective)?;
        let path = path.into();
        persist(&path, &file)?;
        info!(path = %path.display(), "Configuration store opened");

        Ok(Self::from_layers(Layers { file, effective }, Some(path)))
    }

    /// Store that never touches the filesystem
    pub fn in_memory(settings: Settings) -> Self {
        Self::from_layers(
            Layers {
                file: settings.clone(),
                effective: settings,
            },
            None,
        )
    }

    fn from_layers(layers: Layers, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(layers)),
            writer: Arc::new(Mutex::new(())),
            path: path.map(Arc::new),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    /// Copy of the whole effective settings table
    pub fn snapshot(&self) -> Settings {
        self.read().effective.clone()
    }

    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        self.read().effective.get(key)
    }

    /// Set one field and persist; the in-memory value is untouched on failure
    ///
    /// Blocks on file I/O; async callers should go through `spawn_blocking`.
    /// Readers are only held up for the final swap.
    pub fn set(&self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError> {
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = self.read().clone();
        let mut updated = current.clone();
        updated.effective.apply(key, value.clone())?;
        updated.file.apply(key, value)?;
        if updated == current {
            return Ok(());
        }
        validation::validate(&updated.effective)?;

        if let Some(path) = &self.path {
            persist(path, &updated.file)?;
        }
        *self.write() = updated;
        debug!(%key, "Configuration value updated");

        Ok(())
    }

    pub fn search_string(&self) -> String {
        self.read().effective.search_string.clone()
    }

    pub fn set_current_wallpaper(&self, path: &Path) -> Result<(), ConfigError> {
        self.set(
            ConfigKey::CurrentWallpaperPath,
            ConfigValue::Path(Some(path.to_path_buf())),
        )
    }

    fn read(&self) -> RwLockReadGuard<'_, Layers> {
        // A panicking writer never leaves a half-applied table behind
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Layers> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Write the table next to `path`, then rename it over the old file
fn persist(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let persist_error = |source| ConfigError::Persist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(persist_error)?;
    }

    let body = toml::to_string_pretty(settings)?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, body).map_err(persist_error)?;
    fs::rename(&tmp, path).map_err(persist_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::load_from_sources;
    use crate::config::ValidationError;
    use tempfile::TempDir;

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            wallpaper_folder: dir.join("wallpapers"),
            ..Settings::default()
        }
    }

    #[test]
    fn test_open_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        ConfigStore::open(settings_in(temp_dir.path()), &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("wallpapers_to_keep = 100"));
        assert!(!written.contains("current_wallpaper_path"));
    }

    #[test]
    fn test_set_persists_before_returning() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let store = ConfigStore::open(settings_in(temp_dir.path()), &path).unwrap();

        store
            .set(ConfigKey::SearchString, ConfigValue::Text("safe,sunset".to_string()))
            .unwrap();
        store
            .set(ConfigKey::EnableAutoRefresh, ConfigValue::Flag(true))
            .unwrap();

        let reloaded = load_from_sources(&path).unwrap();
        assert_eq!(reloaded.search_string, "safe,sunset");
        assert!(reloaded.enable_auto_refresh);
        assert_eq!(store.search_string(), "safe,sunset");
    }

    #[test]
    fn test_invalid_set_leaves_value_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::in_memory(settings_in(temp_dir.path()));

        let result = store.set(ConfigKey::AutoRefreshIntervalSeconds, ConfigValue::Count(0));

        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(ValidationError::InvalidRefreshInterval(0)))
        ));
        assert_eq!(
            store.get(ConfigKey::AutoRefreshIntervalSeconds),
            ConfigValue::Count(360)
        );
    }

    #[test]
    fn test_clones_share_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::in_memory(settings_in(temp_dir.path()));
        let other = store.clone();

        other
            .set_current_wallpaper(Path::new("/tmp/derpibooru_1.png"))
            .unwrap();

        assert_eq!(
            store.snapshot().current_wallpaper_path,
            Some(PathBuf::from("/tmp/derpibooru_1.png"))
        );
    }

    #[test]
    fn test_persist_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let store = ConfigStore::open(settings_in(temp_dir.path()), &path).unwrap();

        store
            .set(ConfigKey::WallpapersToKeep, ConfigValue::Count(7))
            .unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("config.toml")]);
        assert!(fs::read_to_string(&path).unwrap().contains("wallpapers_to_keep = 7"));
    }

    #[test]
    fn test_overrides_stay_in_memory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let file = settings_in(temp_dir.path());
        let effective = Settings {
            derpibooru_json_api_key: "SECRETKEY".to_string(),
            search_string: "oneoff".to_string(),
            ..file.clone()
        };

        let store = ConfigStore::open_layered(file, effective, &path).unwrap();
        store
            .set(ConfigKey::EnableAutoRefresh, ConfigValue::Flag(true))
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("SECRETKEY"));
        assert!(!written.contains("oneoff"));
        assert!(written.contains("enable_auto_refresh = true"));
        assert_eq!(store.search_string(), "oneoff");
        assert_eq!(
            store.get(ConfigKey::ApiKey),
            ConfigValue::Text("SECRETKEY".to_string())
        );
    }
}
