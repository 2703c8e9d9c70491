//! Content resolution into staged artifacts.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Temporary file holding fully-resolved desired content before deployment.
///
/// The backing file is removed when the artifact is dropped, so cleanup
/// happens on every exit path including dry-run; [`StagedArtifact::dispose`]
/// makes the unlink explicit at the end of the content-change step.
#[derive(Debug)]
pub struct StagedArtifact {
    inner: NamedTempFile,
}

impl StagedArtifact {
    /// Stage `bytes` into a fresh temp file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut inner = NamedTempFile::new().context("Failed to create staging file")?;
        inner
            .write_all(bytes)
            .context("Failed to write staged content")?;
        inner.flush().context("Failed to flush staged content")?;
        Ok(Self { inner })
    }

    /// Wrap an already-written temp file.
    pub fn from_tempfile(inner: NamedTempFile) -> Self {
        Self { inner }
    }

    /// Location of the staged content.
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Remove the staging file now instead of at drop time.
    pub fn dispose(self) -> Result<()> {
        match self.inner.close() {
            Ok(()) => Ok(()),
            // a move deployment has already taken the file away
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context("Failed to remove staging file"),
        }
    }
}

/// Produces the staged artifact for one convergence pass.
///
/// `Ok(None)` means no content change was requested and the pipeline skips
/// the whole content step.
pub trait ContentResolver {
    fn resolve(&mut self) -> Result<Option<StagedArtifact>>;
}

/// Literal declared content.
pub struct InlineContent {
    content: Option<Vec<u8>>,
}

impl InlineContent {
    pub fn new(content: Option<Vec<u8>>) -> Self {
        Self { content }
    }
}

impl ContentResolver for InlineContent {
    fn resolve(&mut self) -> Result<Option<StagedArtifact>> {
        match &self.content {
            Some(bytes) => Ok(Some(StagedArtifact::from_bytes(bytes)?)),
            None => Ok(None),
        }
    }
}
