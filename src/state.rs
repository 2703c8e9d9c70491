//! Desired and observed file state.

use crate::checksum::checksum_file;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Action to converge a path toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// Ensure the file exists with the declared content and attributes.
    Create,
    /// Like [`FileAction::Create`], but only when the file does not exist yet.
    CreateIfMissing,
    /// Remove the file, backing it up first.
    Delete,
    /// Converge like create, then bump access and modification times.
    Touch,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::CreateIfMissing => "create_if_missing",
            Self::Delete => "delete",
            Self::Touch => "touch",
        };
        write!(f, "{name}")
    }
}

/// Declared target state for a single path.
///
/// Supplied by the hosting resource model; immutable for the duration of one
/// convergence pass.
#[derive(Debug, Clone)]
pub struct DesiredState {
    /// Destination path.
    pub path: PathBuf,
    /// Action to take.
    pub action: FileAction,
    /// Literal content. `None` means no content change is requested.
    pub content: Option<Vec<u8>>,
    /// Ordered remote source locators; the first is preferred.
    pub sources: Vec<String>,
    /// Expected content digest; lets remote resolution skip the fetch when
    /// the destination already matches.
    pub checksum: Option<String>,
    /// Permission bits to enforce, e.g. `0o644`.
    pub mode: Option<u32>,
}

impl DesiredState {
    /// Declare a path and the action to converge it toward.
    pub fn new(path: impl Into<PathBuf>, action: FileAction) -> Self {
        Self {
            path: path.into(),
            action,
            content: None,
            sources: Vec::new(),
            checksum: None,
            mode: None,
        }
    }

    /// Declare literal content.
    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Declare remote source locators, tried in order.
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// Declare the content digest the sources are expected to produce.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Declare permission bits to enforce.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// What the filesystem held when the pass started, refreshed after the pass
/// completes so callers can inspect the final state.
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    /// Path the observation was taken for.
    pub path: PathBuf,
    /// Whether the path existed.
    pub exists: bool,
    /// Digest of the current content; `None` for missing files and
    /// directories.
    pub checksum: Option<String>,
    /// Observed permission bits.
    pub mode: Option<u32>,
}

impl ObservedState {
    /// Read the current state of `path` from the filesystem.
    pub fn load(path: &Path) -> Result<Self> {
        let mut observed = Self {
            path: path.to_path_buf(),
            exists: path.exists(),
            checksum: None,
            mode: None,
        };

        if observed.exists {
            let metadata = fs::metadata(path)
                .with_context(|| format!("Failed to stat {}", path.display()))?;
            if !metadata.is_dir() {
                observed.checksum = Some(checksum_file(path)?);
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                observed.mode = Some(metadata.permissions().mode() & 0o7777);
            }
        }

        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let observed = ObservedState::load(&dir.path().join("absent")).unwrap();
        assert!(!observed.exists);
        assert!(observed.checksum.is_none());
        assert!(observed.mode.is_none());
    }

    #[test]
    fn test_observe_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present");
        fs::write(&path, "data").unwrap();

        let observed = ObservedState::load(&path).unwrap();
        assert!(observed.exists);
        assert_eq!(observed.checksum.as_deref(), Some(checksum_file(&path).unwrap().as_str()));
        #[cfg(unix)]
        assert!(observed.mode.is_some());
    }

    #[test]
    fn test_observe_directory_has_no_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let observed = ObservedState::load(dir.path()).unwrap();
        assert!(observed.exists);
        assert!(observed.checksum.is_none());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(FileAction::Create.to_string(), "create");
        assert_eq!(FileAction::CreateIfMissing.to_string(), "create_if_missing");
        assert_eq!(FileAction::Delete.to_string(), "delete");
        assert_eq!(FileAction::Touch.to_string(), "touch");
    }
}
