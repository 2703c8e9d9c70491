//! Deployment strategies: install a staged artifact at its destination.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Pluggable mechanism for creating a destination file and installing staged
/// content onto it.
pub trait DeployStrategy: Send + Sync {
    /// Ensure `path` exists.
    ///
    /// Creates an empty file honoring the process umask when absent; an
    /// existing file is left untouched, content and attributes included.
    fn create(&self, path: &Path) -> Result<()>;

    /// Install the file at `staged` as `dest`.
    fn deploy(&self, staged: &Path, dest: &Path) -> Result<()>;
}

/// Rename-based deployment. The default.
///
/// Atomic on same-filesystem renames. A rename carries the staging file's
/// incidental permission bits, so the destination's own bits are captured
/// before and restored after.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoveDeploy;

impl DeployStrategy for MoveDeploy {
    fn create(&self, path: &Path) -> Result<()> {
        touch(path)
    }

    fn deploy(&self, staged: &Path, dest: &Path) -> Result<()> {
        if staged.parent() != dest.parent() {
            // not filesystem-atomic once the rename crosses devices
            log::debug!("moving staged file across different directories");
        }

        // the destination either already has the correct bits or was created
        // with them; the staging file's bits must not survive the rename
        let mode = destination_mode(dest);

        match fs::rename(staged, dest) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                log::debug!("rename across devices, falling back to copy and remove");
                fs::copy(staged, dest).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        staged.display(),
                        dest.display()
                    )
                })?;
                fs::remove_file(staged).with_context(|| {
                    format!("Failed to remove staged file {}", staged.display())
                })?;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!(
                        "Failed to move {} to {}",
                        staged.display(),
                        dest.display()
                    )
                });
            }
        }

        restore_mode(dest, mode)
    }
}

/// Copy-based deployment.
///
/// Writes bytes into the destination in place, keeping the destination inode
/// with its ownership and security context. Not atomic: a concurrent reader
/// can observe a partially written file.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyDeploy;

impl DeployStrategy for CopyDeploy {
    fn create(&self, path: &Path) -> Result<()> {
        touch(path)
    }

    fn deploy(&self, staged: &Path, dest: &Path) -> Result<()> {
        let mut src = fs::File::open(staged)
            .with_context(|| format!("Failed to open staged file {}", staged.display()))?;
        let mut dst = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(dest)
            .with_context(|| format!("Failed to open destination {}", dest.display()))?;
        io::copy(&mut src, &mut dst).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                staged.display(),
                dest.display()
            )
        })?;
        Ok(())
    }
}

fn touch(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn destination_mode(dest: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(dest)
        .ok()
        .map(|meta| meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn destination_mode(_dest: &Path) -> Option<u32> {
    None
}

#[cfg(unix)]
fn restore_mode(dest: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(dest, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to restore mode on {}", dest.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_mode(_dest: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_makes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh");
        MoveDeploy.create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(fs::read(&path).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_create_leaves_existing_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing");
        fs::write(&path, "keep me").unwrap();
        MoveDeploy.create(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[cfg(unix)]
    #[test]
    fn test_move_deploy_preserves_destination_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged");
        let dest = dir.path().join("dest");
        fs::write(&staged, "new content").unwrap();
        fs::write(&dest, "old content").unwrap();
        fs::set_permissions(&staged, fs::Permissions::from_mode(0o644)).unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o600)).unwrap();

        MoveDeploy.deploy(&staged, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new content");
        assert!(!staged.exists());
        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_deploy_keeps_destination_inode_and_mode() {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged");
        let dest = dir.path().join("dest");
        fs::write(&staged, "new content").unwrap();
        fs::write(&dest, "old content").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o640)).unwrap();
        let inode_before = fs::metadata(&dest).unwrap().ino();

        CopyDeploy.deploy(&staged, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new content");
        assert_eq!(fs::metadata(&dest).unwrap().ino(), inode_before);
        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o640);
        // copy leaves the staged file in place; the caller disposes it
        assert!(staged.exists());
    }

    #[test]
    fn test_move_deploy_onto_missing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged");
        let dest = dir.path().join("dest");
        fs::write(&staged, "payload").unwrap();

        MoveDeploy.deploy(&staged, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
    }
}
