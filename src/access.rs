//! Attribute convergence hook.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Ownership and permission enforcement collaborator.
///
/// Invoked after content convergence whether or not content changed; the
/// implementation decides what, if anything, still has to move. Full
/// ACL/ownership mechanics live with the hosting engine.
pub trait AccessControl {
    /// Whether any attribute differs from the declared target.
    fn requires_changes(&self) -> Result<bool>;

    /// Human-readable description of the pending attribute changes.
    fn describe_changes(&self) -> Vec<String>;

    /// Enforce every declared attribute.
    fn apply_all(&self) -> Result<()>;
}

/// Converges unix permission bits to a declared mode.
#[cfg(unix)]
pub struct ModeControl {
    path: PathBuf,
    mode: u32,
}

#[cfg(unix)]
impl ModeControl {
    pub fn new(path: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    fn current_mode(&self) -> Result<Option<u32>> {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok(Some(metadata.permissions().mode() & 0o7777)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to stat {}", self.path.display()))
            }
        }
    }
}

#[cfg(unix)]
impl AccessControl for ModeControl {
    fn requires_changes(&self) -> Result<bool> {
        Ok(self.current_mode()? != Some(self.mode))
    }

    fn describe_changes(&self) -> Vec<String> {
        match self.current_mode().ok().flatten() {
            Some(current) => vec![format!(
                "change mode from {:04o} to {:04o} on {}",
                current,
                self.mode,
                self.path.display()
            )],
            None => vec![format!(
                "set mode to {:04o} on {}",
                self.mode,
                self.path.display()
            )],
        }
    }

    fn apply_all(&self) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(self.mode))
            .with_context(|| format!("Failed to set mode on {}", self.path.display()))
    }
}
