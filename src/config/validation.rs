use super::models::Settings;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("auto_refresh_interval_seconds must be at least 1, got {0}")]
    InvalidRefreshInterval(u64),

    #[error("wallpapers_to_keep must be at least 1, got {0}")]
    InvalidRetention(u32),

    #[error("derpibooru_json_api_url must be an http(s) URL, got '{0}'")]
    InvalidApiUrl(String),

    #[error("wallpaper_folder must be an absolute path, got '{0}'")]
    RelativeWallpaperFolder(String),
}

/// Validate the entire settings table
pub fn validate(settings: &Settings) -> Result<(), ValidationError> {
    validate_schedule(settings)?;
    validate_api(settings)?;
    validate_folder(settings)?;
    Ok(())
}

fn validate_schedule(settings: &Settings) -> Result<(), ValidationError> {
    if settings.auto_refresh_interval_seconds == 0 {
        return Err(ValidationError::InvalidRefreshInterval(
            settings.auto_refresh_interval_seconds,
        ));
    }

    if settings.wallpapers_to_keep == 0 {
        return Err(ValidationError::InvalidRetention(settings.wallpapers_to_keep));
    }

    Ok(())
}

fn validate_api(settings: &Settings) -> Result<(), ValidationError> {
    let url = settings.derpibooru_json_api_url.trim();
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| ValidationError::InvalidApiUrl(url.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ValidationError::InvalidApiUrl(url.to_string()));
    }

    Ok(())
}

fn validate_folder(settings: &Settings) -> Result<(), ValidationError> {
    if !settings.wallpaper_folder.is_absolute() {
        return Err(ValidationError::RelativeWallpaperFolder(
            settings.wallpaper_folder.display().to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_settings() -> Settings {
        Settings {
            wallpaper_folder: std::env::temp_dir().join("derpiwall-validation"),
            ..Settings::default()
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&valid_settings()).is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = Settings {
            auto_refresh_interval_seconds: 0,
            ..valid_settings()
        };
        assert_eq!(
            validate(&settings),
            Err(ValidationError::InvalidRefreshInterval(0))
        );
    }

    #[test]
    fn test_zero_retention_rejected() {
        let settings = Settings {
            wallpapers_to_keep: 0,
            ..valid_settings()
        };
        assert_eq!(validate(&settings), Err(ValidationError::InvalidRetention(0)));
    }

    #[test]
    fn test_api_url_must_be_http() {
        for url in ["", "not a url", "ftp://derpibooru.org/api/v1/json/"] {
            let settings = Settings {
                derpibooru_json_api_url: url.to_string(),
                ..valid_settings()
            };
            assert!(matches!(
                validate(&settings),
                Err(ValidationError::InvalidApiUrl(_))
            ));
        }
    }

    #[test]
    fn test_relative_folder_rejected() {
        let settings = Settings {
            wallpaper_folder: PathBuf::from("relative/wallpapers"),
            ..valid_settings()
        };
        assert!(matches!(
            validate(&settings),
            Err(ValidationError::RelativeWallpaperFolder(_))
        ));
    }
}
