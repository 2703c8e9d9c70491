//! Pre-change backups with rotation.

use crate::config::ConvergeConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// Copies a destination file aside before it is overwritten or deleted.
///
/// Disabled configuration is not an error: with no rotation count set, every
/// request is a silent no-op.
pub struct BackupKeeper<'a> {
    config: &'a ConvergeConfig,
}

impl<'a> BackupKeeper<'a> {
    pub fn new(config: &'a ConvergeConfig) -> Self {
        Self { config }
    }

    /// Back up `path`, then evict the oldest copies beyond the rotation
    /// bound. Returns the backup location, or `None` when nothing was done.
    pub fn backup(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(keep) = self.config.backup_count else {
            return Ok(None);
        };
        if keep == 0 || !path.is_file() {
            return Ok(None);
        }

        let name = file_name(path);
        let dir = self.backup_dir_for(path);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create backup directory {}", dir.display()))?;

        // millisecond stamps stay unique within a pass and sort
        // lexicographically
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let backup_path = dir.join(format!("{name}.bak-{stamp}"));
        fs::copy(path, &backup_path).with_context(|| {
            format!(
                "Failed to back up {} to {}",
                path.display(),
                backup_path.display()
            )
        })?;
        log::info!("backed up {} to {}", path.display(), backup_path.display());

        self.rotate(&dir, &name, keep)?;
        Ok(Some(backup_path))
    }

    /// Where backups of `path` live: next to the file, or mirrored under the
    /// configured backup root.
    fn backup_dir_for(&self, path: &Path) -> PathBuf {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        match &self.config.backup_dir {
            Some(root) => root.join(parent.strip_prefix("/").unwrap_or(parent)),
            None => parent.to_path_buf(),
        }
    }

    /// Keep the `keep` newest backups of one logical path, delete the rest.
    fn rotate(&self, dir: &Path, name: &str, keep: usize) -> Result<()> {
        let prefix = format!("{name}.bak-");
        let mut backups: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to list backup directory {}", dir.display()))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|candidate| {
                candidate
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();

        // newest first; stamps are fixed-width so name order is time order
        backups.sort_unstable_by(|a, b| b.file_name().cmp(&a.file_name()));

        for stale in backups.iter().skip(keep) {
            log::debug!("removing old backup {}", stale.display());
            fs::remove_file(stale)
                .with_context(|| format!("Failed to remove old backup {}", stale.display()))?;
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvergeConfig;

    fn list_backups(dir: &Path, name: &str) -> Vec<PathBuf> {
        let prefix = format!("{name}.bak-");
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_backup_copies_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");
        fs::write(&path, "original").unwrap();

        let config = ConvergeConfig::default();
        let keeper = BackupKeeper::new(&config);
        let backup = keeper.backup(&path).unwrap().unwrap();

        assert_eq!(fs::read_to_string(&backup).unwrap(), "original");
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_disabled_backup_is_silent_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");
        fs::write(&path, "original").unwrap();

        let config = ConvergeConfig {
            backup_count: None,
            ..ConvergeConfig::default()
        };
        let keeper = BackupKeeper::new(&config);
        assert!(keeper.backup(&path).unwrap().is_none());
        assert!(list_backups(dir.path(), "app.conf").is_empty());
    }

    #[test]
    fn test_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvergeConfig::default();
        let keeper = BackupKeeper::new(&config);
        assert!(keeper.backup(&dir.path().join("absent")).unwrap().is_none());
    }

    #[test]
    fn test_rotation_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");

        let config = ConvergeConfig {
            backup_count: Some(2),
            ..ConvergeConfig::default()
        };
        let keeper = BackupKeeper::new(&config);

        let mut last = None;
        for round in 0..4 {
            fs::write(&path, format!("revision {round}")).unwrap();
            last = keeper.backup(&path).unwrap();
            // keep stamps strictly increasing
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let backups = list_backups(dir.path(), "app.conf");
        assert_eq!(backups.len(), 2);
        assert!(backups.contains(&last.unwrap()));
        // the newest surviving backup holds the latest pre-change content
        assert_eq!(
            fs::read_to_string(backups.last().unwrap()).unwrap(),
            "revision 3"
        );
    }

    #[test]
    fn test_backup_dir_mirrors_path() {
        let dir = tempfile::tempdir().unwrap();
        let vault = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc.conf");
        fs::write(&path, "data").unwrap();

        let config = ConvergeConfig {
            backup_dir: Some(vault.path().to_path_buf()),
            ..ConvergeConfig::default()
        };
        let keeper = BackupKeeper::new(&config);
        let backup = keeper.backup(&path).unwrap().unwrap();

        assert!(backup.starts_with(vault.path()));
        assert!(list_backups(dir.path(), "etc.conf").is_empty());
        assert_eq!(fs::read_to_string(&backup).unwrap(), "data");
    }
}
