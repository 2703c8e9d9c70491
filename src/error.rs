//! Error types for convergence operations.
//!
//! Operations return `anyhow::Result`; the variants here carry the failure
//! kinds callers are expected to match on, and stay downcastable through
//! `anyhow` (`err.downcast_ref::<ConvergeError>()`).

use std::path::PathBuf;

/// Failures with a defined meaning in the convergence contract.
#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    /// The directory that should hold the target path does not exist.
    #[error("parent directory {} does not exist", .path.display())]
    EnclosingDirectoryMissing {
        /// The missing parent directory.
        path: PathBuf,
    },

    /// The target exists but cannot be written, so it cannot be deleted.
    #[error("file {} exists but is not writable so it cannot be deleted", .path.display())]
    InsufficientPermissions {
        /// The undeletable file.
        path: PathBuf,
    },

    /// A staged artifact was handed over without a live file behind it.
    ///
    /// This signals a defect in the content resolver, never a condition to
    /// recover from.
    #[error("staged content for {} does not exist on disk", .path.display())]
    StagedArtifactMissing {
        /// The destination the artifact was staged for.
        path: PathBuf,
    },

    /// A source locator could not be parsed. Never retried against other
    /// sources: a malformed locator is a caller bug.
    #[error("invalid source {locator}: {reason}")]
    InvalidSource {
        /// The locator as given.
        locator: String,
        /// Why parsing rejected it.
        reason: String,
    },

    /// A source locator names a scheme with no registered fetcher.
    #[error("unsupported scheme {scheme:?} in source {locator}")]
    UnsupportedScheme {
        /// The unrecognized scheme.
        scheme: String,
        /// The locator as given.
        locator: String,
    },
}
