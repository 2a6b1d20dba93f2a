use async_trait::async_trait;
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use super::{Result, WallpaperError, WallpaperSetter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinuxDesktop {
    Gnome,
    Kde,
    Xfce,
}

/// Wallpaper setter for the desktop the process runs under
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopWallpaper;

#[async_trait]
impl WallpaperSetter for DesktopWallpaper {
    async fn set_wallpaper(&self, path: &Path) -> Result<()> {
        match env::consts::OS {
            "linux" => set_linux(path).await?,
            "macos" => set_macos(path).await?,
            "windows" => set_windows(path).await?,
            other => return Err(WallpaperError::UnsupportedPlatform(other)),
        }

        info!(path = %path.display(), "Desktop wallpaper set");
        Ok(())
    }
}

async fn set_linux(path: &Path) -> Result<()> {
    let desktop = detect_desktop().await.ok_or(WallpaperError::UnsupportedDesktop)?;
    debug!(?desktop, "Detected desktop environment");

    match desktop {
        LinuxDesktop::Gnome => {
            let uri = format!("file://{}", path.display());
            run_or_raise(
                "gsettings",
                ["set", "org.gnome.desktop.background", "picture-uri", uri.as_str()],
            )
            .await
        }
        LinuxDesktop::Kde => {
            let qdbus = find_qdbus().ok_or(WallpaperError::MissingExecutable("qdbus"))?;
            let script = format!(
                r#"
                var allDesktops = desktops();
                for (i = 0; i < allDesktops.length; i++) {{
                    d = allDesktops[i];
                    d.wallpaperPlugin = "org.kde.image";
                    d.currentConfigGroup = Array("Wallpaper", "org.kde.image", "General");
                    d.writeConfig("Image", "file://{}");
                }}
                "#,
                path.display()
            );
            run_or_raise(
                qdbus.as_os_str(),
                [
                    OsStr::new("org.kde.plasmashell"),
                    OsStr::new("/PlasmaShell"),
                    OsStr::new("org.kde.PlasmaShell.evaluateScript"),
                    OsStr::new(&script),
                ],
            )
            .await
        }
        LinuxDesktop::Xfce => {
            run_or_raise(
                "xfconf-query",
                [
                    OsStr::new("--channel"),
                    OsStr::new("xfce4-desktop"),
                    OsStr::new("--property"),
                    OsStr::new("/backdrop/screen0/monitor0/image-path"),
                    OsStr::new("--set"),
                    path.as_os_str(),
                ],
            )
            .await
        }
    }
}

async fn set_macos(path: &Path) -> Result<()> {
    let script = format!(
        r#"
        tell application "System Events"
            set desktopCount to count of desktops
            repeat with desktopNumber from 1 to desktopCount
                tell desktop desktopNumber
                    set picture to "{}"
                end tell
            end repeat
        end tell
        "#,
        path.display()
    );
    run_or_raise("osascript", ["-e", script.as_str()]).await
}

async fn set_windows(path: &Path) -> Result<()> {
    // SPI_SETDESKWALLPAPER = 20, SPIF_UPDATEINIFILE | SPIF_SENDCHANGE = 3
    let escaped = path.display().to_string().replace('\'', "''");
    let script = format!(
        "Add-Type -TypeDefinition 'using System.Runtime.InteropServices; \
         public class Wallpaper {{ [DllImport(\"user32.dll\", CharSet = CharSet.Unicode)] \
         public static extern int SystemParametersInfo(int action, int param, string value, int flags); }}'; \
         if ([Wallpaper]::SystemParametersInfo(20, 0, '{escaped}', 3) -eq 0) {{ exit 1 }}"
    );
    run_or_raise("powershell", ["-NoProfile", "-Command", script.as_str()]).await
}

/// Run a command; a non-zero exit becomes an error carrying its stdout
async fn run_or_raise<P, I, S>(program: P, args: I) -> Result<()>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program_name = program.as_ref().to_string_lossy().into_owned();
    let output = Command::new(program.as_ref())
        .args(args)
        .output()
        .await
        .map_err(|source| WallpaperError::Spawn {
            program: program_name.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(WallpaperError::Command {
            program: program_name,
            output: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        });
    }

    Ok(())
}

/// Best-effort detection of the running Linux desktop environment
///
/// Environment hints first (works for X11 and Wayland), then well-known
/// session processes.
pub async fn detect_desktop() -> Option<LinuxDesktop> {
    let var = |name: &str| env::var(name).unwrap_or_default();
    let from_env = desktop_from_env(
        &var("XDG_CURRENT_DESKTOP"),
        &var("DESKTOP_SESSION"),
        &var("KDE_FULL_SESSION"),
        !var("GNOME_DESKTOP_SESSION_ID").is_empty(),
    );
    if from_env.is_some() {
        return from_env;
    }

    let output = Command::new("ps").args(["-eo", "comm"]).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    desktop_from_processes(&String::from_utf8_lossy(&output.stdout))
}

fn desktop_from_env(
    xdg_current_desktop: &str,
    desktop_session: &str,
    kde_full_session: &str,
    gnome_session_id: bool,
) -> Option<LinuxDesktop> {
    let candidates = format!("{xdg_current_desktop} {desktop_session}").to_lowercase();

    if ["gnome", "unity"].iter().any(|k| candidates.contains(k)) {
        return Some(LinuxDesktop::Gnome);
    }
    if ["kde", "plasma"].iter().any(|k| candidates.contains(k)) {
        return Some(LinuxDesktop::Kde);
    }
    if candidates.contains("xfce") {
        return Some(LinuxDesktop::Xfce);
    }

    if matches!(kde_full_session.to_lowercase().as_str(), "1" | "true" | "yes") {
        return Some(LinuxDesktop::Kde);
    }
    if gnome_session_id {
        return Some(LinuxDesktop::Gnome);
    }

    None
}

fn desktop_from_processes(processes: &str) -> Option<LinuxDesktop> {
    let processes = processes.to_lowercase();
    if processes.contains("gnome-shell") {
        Some(LinuxDesktop::Gnome)
    } else if processes.contains("plasmashell") {
        Some(LinuxDesktop::Kde)
    } else if processes.contains("xfce4-session") {
        Some(LinuxDesktop::Xfce)
    } else {
        None
    }
}

/// First `qdbus`, `qdbus6`, `qdbus-qt5`, ... found on `PATH`
fn find_qdbus() -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flat_map(|entries| entries.filter_map(|entry| entry.ok()))
        .find(|entry| entry.file_name().to_str().is_some_and(is_qdbus_name))
        .map(|entry| entry.path())
}

fn is_qdbus_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("qdbus") else {
        return false;
    };
    let digits = rest.strip_prefix("-qt").unwrap_or(rest);
    digits.chars().all(|c| c.is_ascii_digit())
}
