//! Desktop wallpaper collaborator

mod platform;

pub use platform::{detect_desktop, DesktopWallpaper, LinuxDesktop};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WallpaperError {
    #[error("Unable to detect Linux desktop environment (GNOME/KDE/XFCE).")]
    UnsupportedDesktop,

    #[error("Unsupported operating system for setting wallpaper: {0}")]
    UnsupportedPlatform(&'static str),

    #[error("Failed to find {0} executable")]
    MissingExecutable(&'static str),

    #[error("{program} failed: {output}")]
    Command { program: String, output: String },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, WallpaperError>;

/// Applies an image file as the desktop background
#[async_trait]
pub trait WallpaperSetter: Send + Sync {
    async fn set_wallpaper(&self, path: &Path) -> Result<()>;
}
