//! Precondition checks gating each action.

use crate::error::ConvergeError;
use crate::state::FileAction;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Predicate over the destination path.
pub type Check = Box<dyn Fn(&Path) -> bool + Send + Sync>;
/// Builds the typed failure for an unmet assertion.
pub type Failure = Box<dyn Fn(&Path) -> ConvergeError + Send + Sync>;
/// Builds the assumed-satisfied narrative reported in dry-run mode.
pub type Narrative = Box<dyn Fn(&Path) -> String + Send + Sync>;

/// A single precondition: predicate, typed failure, and an optional dry-run
/// narrative.
///
/// With a narrative, a failed check in dry-run mode is assumed satisfied and
/// the pass continues as a simulation. Without one the failure is fatal in
/// both modes.
struct Requirement {
    actions: Vec<FileAction>,
    check: Check,
    failure: Failure,
    whyrun: Option<Narrative>,
}

/// Assertions evaluated before any mutation.
pub struct Requirements {
    items: Vec<Requirement>,
}

impl Requirements {
    /// An empty registry.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// The standard file assertions.
    ///
    /// Create-flavored actions need the enclosing directory to exist (in
    /// dry-run it is assumed it would have been created). Delete needs an
    /// existing destination to be writable, fatal even in dry-run since a
    /// deletion cannot be meaningfully simulated past that point.
    pub fn standard() -> Self {
        let mut requirements = Self::new();

        let assume_created: Narrative = Box::new(|path: &Path| {
            format!(
                "Assuming directory {} would have been created",
                parent_dir(path).display()
            )
        });
        requirements.assert(
            vec![
                FileAction::Create,
                FileAction::CreateIfMissing,
                FileAction::Touch,
            ],
            |path| parent_dir(path).is_dir(),
            |path| ConvergeError::EnclosingDirectoryMissing {
                path: parent_dir(path),
            },
            Some(assume_created),
        );

        requirements.assert(
            vec![FileAction::Delete],
            |path| !path.exists() || is_writable(path),
            |path| ConvergeError::InsufficientPermissions {
                path: path.to_path_buf(),
            },
            None,
        );

        requirements
    }

    /// Register an assertion for a set of actions.
    pub fn assert(
        &mut self,
        actions: Vec<FileAction>,
        check: impl Fn(&Path) -> bool + Send + Sync + 'static,
        failure: impl Fn(&Path) -> ConvergeError + Send + Sync + 'static,
        whyrun: Option<Narrative>,
    ) {
        self.items.push(Requirement {
            actions,
            check: Box::new(check),
            failure: Box::new(failure),
            whyrun,
        });
    }

    /// Run every assertion registered for `action` against `path`.
    ///
    /// Dry-run narratives for assumed-satisfied checks are appended to
    /// `assumptions`.
    pub fn run(
        &self,
        action: FileAction,
        path: &Path,
        dry_run: bool,
        assumptions: &mut Vec<String>,
    ) -> Result<()> {
        for requirement in self.items.iter().filter(|r| r.actions.contains(&action)) {
            if (requirement.check)(path) {
                continue;
            }
            match &requirement.whyrun {
                Some(narrative) if dry_run => {
                    let assumed = narrative(path);
                    log::warn!("{assumed}");
                    assumptions.push(assumed);
                }
                _ => return Err((requirement.failure)(path).into()),
            }
        }
        Ok(())
    }
}

impl Default for Requirements {
    fn default() -> Self {
        Self::standard()
    }
}

/// Directory that must hold `path`; a bare file name lives in `.`.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether the current process can open `path` for writing.
fn is_writable(path: &Path) -> bool {
    fs::OpenOptions::new().write(true).open(path).is_ok()
}
