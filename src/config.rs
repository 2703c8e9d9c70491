//! Convergence configuration.
//!
//! The hosting engine reads these values from its own configuration layer
//! and threads them into every component by reference. Nothing in this crate
//! consults ambient process state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunables for a convergence pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergeConfig {
    /// Report intended changes without mutating the filesystem.
    pub dry_run: bool,

    /// Suppress diff output entirely.
    pub diff_disabled: bool,

    /// Files larger than this many bytes are never diffed.
    pub diff_filesize_threshold: u64,

    /// Diff output longer than this many characters is suppressed.
    pub diff_output_threshold: usize,

    /// How many rotated backups to retain per path.
    ///
    /// `None` (or `Some(0)`) disables backups; requesting a backup then
    /// becomes a silent no-op rather than an error.
    pub backup_count: Option<usize>,

    /// Root directory for backups, mirroring the original path underneath.
    ///
    /// `None` keeps backups next to the file they were taken from.
    pub backup_dir: Option<PathBuf>,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            diff_disabled: false,
            diff_filesize_threshold: 10_000_000,
            diff_output_threshold: 1_000_000,
            backup_count: Some(5),
            backup_dir: None,
        }
    }
}

impl ConvergeConfig {
    /// Configuration for a simulation-only pass.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConvergeConfig::default();
        assert!(!config.dry_run);
        assert!(!config.diff_disabled);
        assert_eq!(config.backup_count, Some(5));
        assert!(config.backup_dir.is_none());
    }

    #[test]
    fn test_partial_input_fills_defaults() {
        let config: ConvergeConfig = serde_json::from_str(r#"{"dry_run": true}"#).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.diff_filesize_threshold, 10_000_000);
        assert_eq!(config.backup_count, Some(5));
    }
}
