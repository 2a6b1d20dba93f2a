//! Wallpaper cache layout and retention

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Prefix shared by every cache file; other files in the folder are never touched
pub const CACHE_PREFIX: &str = "derpibooru_";

/// `<folder>/derpibooru_<id>.png`
pub fn cache_file_path(folder: &Path, image_id: u64) -> PathBuf {
    folder.join(format!("{CACHE_PREFIX}{image_id}.png"))
}

pub fn is_cache_file(name: &str) -> bool {
    name.starts_with(CACHE_PREFIX)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub scanned: usize,
    pub removed: usize,
}

/// Delete the oldest cache files until at most `keep` remain
///
/// A missing folder or a file that vanishes mid-pass is not an error.
pub fn prune(folder: &Path, keep: usize) -> io::Result<PruneStats> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(folder = %folder.display(), "Wallpaper folder missing; nothing to prune");
            return Ok(PruneStats::default());
        }
        Err(e) => return Err(e),
    };

    let mut files: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().is_some_and(is_cache_file))
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((meta.modified().ok()?, entry.path()))
        })
        .collect();

    let mut stats = PruneStats {
        scanned: files.len(),
        removed: 0,
    };
    if files.len() <= keep {
        return Ok(stats);
    }

    files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    let excess = files.len() - keep;

    for (_, path) in files.into_iter().take(excess) {
        if remove_if_exists(&path)? {
            stats.removed += 1;
        }
    }

    info!(
        folder = %folder.display(),
        scanned = stats.scanned,
        removed = stats.removed,
        keep,
        "Wallpaper cache pruned"
    );
    Ok(stats)
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed cached wallpaper");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Cached wallpaper vanished before removal");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(folder: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = folder.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        path
    }

    #[test]
    fn test_cache_file_path() {
        let path = cache_file_path(Path::new("/tmp/walls"), 1234);
        assert_eq!(path, PathBuf::from("/tmp/walls/derpibooru_1234.png"));
        assert!(is_cache_file("derpibooru_1234.png"));
        assert!(!is_cache_file("holiday.png"));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let oldest = touch(dir.path(), "derpibooru_1.png", 400);
        let old = touch(dir.path(), "derpibooru_2.png", 300);
        let newer = touch(dir.path(), "derpibooru_3.png", 200);
        let newest = touch(dir.path(), "derpibooru_4.png", 100);

        let stats = prune(dir.path(), 2).unwrap();

        assert_eq!(stats, PruneStats { scanned: 4, removed: 2 });
        assert!(!oldest.exists());
        assert!(!old.exists());
        assert!(newer.exists());
        assert!(newest.exists());
    }

    #[test]
    fn test_prune_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let foreign = touch(dir.path(), "family.jpg", 1000);
        touch(dir.path(), "derpibooru_1.png", 10);
        fs::create_dir(dir.path().join("derpibooru_dir")).unwrap();

        let stats = prune(dir.path(), 1).unwrap();

        assert_eq!(stats, PruneStats { scanned: 1, removed: 0 });
        assert!(foreign.exists());
    }

    #[test]
    fn test_prune_missing_folder() {
        let dir = TempDir::new().unwrap();
        let stats = prune(&dir.path().join("missing"), 5).unwrap();
        assert_eq!(stats, PruneStats::default());
    }

    #[test]
    fn test_remove_if_exists_missing_ok() {
        let dir = TempDir::new().unwrap();
        assert!(!remove_if_exists(&dir.path().join("derpibooru_9.png")).unwrap());
    }
}
