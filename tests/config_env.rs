//! Environment overrides against a real settings file
//!
//! Kept in its own test binary: it mutates the process environment.

use std::fs;
use tempfile::TempDir;

use derpiwall::config::{ConfigKey, ConfigStore, ConfigValue};

#[test]
fn test_env_overrides_are_not_written_back() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let folder = temp_dir.path().join("walls");
    fs::write(
        &config_path,
        format!(
            "search_string = \"safe\"\nwallpaper_folder = \"{}\"\n",
            folder.display()
        ),
    )
    .unwrap();

    // SAFETY: the only test in this binary, so no other thread reads the environment
    unsafe {
        std::env::set_var("DERPIWALL__SEARCH_STRING", "oneoff");
        std::env::set_var("DERPIWALL__DERPIBOORU_JSON_API_KEY", "SECRETKEY");
    }

    let store = ConfigStore::load(Some(config_path.clone())).unwrap();
    assert_eq!(store.search_string(), "oneoff");
    assert_eq!(
        store.get(ConfigKey::ApiKey),
        ConfigValue::Text("SECRETKEY".to_string())
    );

    let written = fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("search_string = \"safe\""));
    assert!(!written.contains("oneoff"));
    assert!(!written.contains("SECRETKEY"));

    // Unrelated writes keep the overrides out of the file too
    store
        .set(ConfigKey::WallpapersToKeep, ConfigValue::Count(5))
        .unwrap();
    let written = fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("wallpapers_to_keep = 5"));
    assert!(written.contains("search_string = \"safe\""));
    assert!(!written.contains("SECRETKEY"));

    unsafe {
        std::env::remove_var("DERPIWALL__SEARCH_STRING");
        std::env::remove_var("DERPIWALL__DERPIBOORU_JSON_API_KEY");
    }
}
