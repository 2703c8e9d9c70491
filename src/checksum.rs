//! Content fingerprinting for change detection.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::Path;

/// Compute the hex digest of a file's bytes.
///
/// The digest is a change-detection key, not a security primitive: equal
/// digests mean "no content change", full stop. Content is streamed so large
/// files do not land in memory.
pub fn checksum_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for checksumming", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {} for checksumming", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// First six characters of a digest, or `"none"` when absent.
///
/// Keeps converge descriptions readable.
pub fn short_checksum(checksum: Option<&str>) -> String {
    match checksum {
        Some(sum) => sum.chars().take(6).collect(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_checksum_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.txt");
        fs::write(&path, "hello world\n").unwrap();

        let first = checksum_file(&path).unwrap();
        let second = checksum_file(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_checksum_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, "one").unwrap();
        fs::write(&b, "two").unwrap();

        assert_ne!(checksum_file(&a).unwrap(), checksum_file(&b).unwrap());

        fs::write(&b, "one").unwrap();
        assert_eq!(checksum_file(&a).unwrap(), checksum_file(&b).unwrap());
    }

    #[test]
    fn test_checksum_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(checksum_file(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_short_checksum() {
        assert_eq!(short_checksum(Some("abcdef0123456789")), "abcdef");
        assert_eq!(short_checksum(Some("ab")), "ab");
        assert_eq!(short_checksum(None), "none");
    }
}
