//! Convergence controller: the create/delete/touch state machine.
//!
//! Every mutation goes through [`converge_by`]: the description is recorded
//! and reported unconditionally, the action block runs only outside dry-run.
//! Dry-run semantics live here once, never re-implemented per action.

use crate::access::AccessControl;
use crate::backup::BackupKeeper;
use crate::checksum::{checksum_file, short_checksum};
use crate::config::ConvergeConfig;
use crate::content::{ContentResolver, InlineContent};
use crate::deploy::{DeployStrategy, MoveDeploy};
use crate::diff::Differ;
use crate::error::ConvergeError;
use crate::remote::RemoteContent;
use crate::requirements::Requirements;
use crate::state::{DesiredState, FileAction, ObservedState};
use anyhow::{Context, Result};
use std::fs;
use std::time::SystemTime;

/// One mutation, performed or simulated, during a pass.
#[derive(Debug, Clone)]
pub struct ConvergeRecord {
    /// Description lines; the first names the change, the rest are detail
    /// (a diff, say).
    pub description: Vec<String>,
    /// `false` when the pass ran in dry-run mode.
    pub applied: bool,
}

/// Receives converge records as they happen.
///
/// The hosting engine points this at its reporting sink; [`NullReporter`]
/// drops everything.
pub trait ConvergeReporter {
    fn on_converge(&mut self, record: &ConvergeRecord);
}

/// Reporter that drops every record.
pub struct NullReporter;

impl ConvergeReporter for NullReporter {
    fn on_converge(&mut self, _record: &ConvergeRecord) {}
}

/// What a pass did, or would have done.
#[derive(Debug, Default)]
pub struct ConvergeSummary {
    /// Mutations in execution order.
    pub records: Vec<ConvergeRecord>,
    /// Dry-run requirement narratives ("Assuming directory ... would have
    /// been created").
    pub assumptions: Vec<String>,
    /// Observed state after the pass. Kept as observed at pass start for
    /// `create_if_missing`: an intentionally untouched path is not re-read.
    pub observed: ObservedState,
}

impl ConvergeSummary {
    /// Whether anything changed (or would change).
    pub fn changed(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Orchestrates requirement checks, content resolution, backup, diff and
/// deployment for a single path.
///
/// Services are injected; [`Converger::new`] wires the defaults implied by
/// the desired state (remote sources get a [`RemoteContent`] resolver,
/// literal content an [`InlineContent`] one, deployment is move-based, a
/// declared mode gets a [`crate::access::ModeControl`]).
pub struct Converger<'a> {
    config: &'a ConvergeConfig,
    desired: DesiredState,
    observed: ObservedState,
    content: Box<dyn ContentResolver>,
    strategy: Box<dyn DeployStrategy>,
    access: Option<Box<dyn AccessControl>>,
    requirements: Requirements,
    records: Vec<ConvergeRecord>,
}

impl<'a> Converger<'a> {
    /// Observe the destination and wire default services for `desired`.
    pub fn new(config: &'a ConvergeConfig, desired: DesiredState) -> Result<Self> {
        let observed = ObservedState::load(&desired.path)?;

        let content: Box<dyn ContentResolver> = if desired.sources.is_empty() {
            Box::new(InlineContent::new(desired.content.clone()))
        } else {
            Box::new(
                RemoteContent::new(desired.sources.clone())
                    .with_target_checksum(desired.checksum.clone())
                    .with_current_checksum(observed.checksum.clone()),
            )
        };

        #[cfg(unix)]
        let access: Option<Box<dyn AccessControl>> = desired
            .mode
            .map(|mode| {
                Box::new(crate::access::ModeControl::new(&desired.path, mode))
                    as Box<dyn AccessControl>
            });
        #[cfg(not(unix))]
        let access: Option<Box<dyn AccessControl>> = None;

        Ok(Self {
            config,
            desired,
            observed,
            content,
            strategy: Box::new(MoveDeploy),
            access,
            requirements: Requirements::standard(),
            records: Vec::new(),
        })
    }

    /// Replace the content resolver.
    pub fn with_content(mut self, content: Box<dyn ContentResolver>) -> Self {
        self.content = content;
        self
    }

    /// Replace the deployment strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn DeployStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the attribute enforcement collaborator.
    pub fn with_access(mut self, access: Box<dyn AccessControl>) -> Self {
        self.access = Some(access);
        self
    }

    /// State observed at pass start (refreshed by [`Converger::run`]).
    pub fn observed(&self) -> &ObservedState {
        &self.observed
    }

    /// Converge the destination, reporting through `reporter`.
    pub fn run(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<ConvergeSummary> {
        let mut assumptions = Vec::new();
        self.requirements.run(
            self.desired.action,
            &self.desired.path,
            self.config.dry_run,
            &mut assumptions,
        )?;

        match self.desired.action {
            FileAction::Create => self.action_create(reporter)?,
            FileAction::CreateIfMissing => self.action_create_if_missing(reporter)?,
            FileAction::Delete => self.action_delete(reporter)?,
            FileAction::Touch => self.action_touch(reporter)?,
        }

        // write-back so callers can inspect the final state; deliberately
        // skipped for create_if_missing, an intentionally untouched path is
        // not re-hashed
        if self.desired.action != FileAction::CreateIfMissing {
            self.observed = ObservedState::load(&self.desired.path)?;
        }

        Ok(ConvergeSummary {
            records: std::mem::take(&mut self.records),
            assumptions,
            observed: self.observed.clone(),
        })
    }

    fn action_create(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<()> {
        self.do_create_file(reporter)?;
        self.do_content_changes(reporter)?;
        self.do_access_changes(reporter)?;
        Ok(())
    }

    fn action_create_if_missing(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<()> {
        if self.desired.path.exists() {
            log::debug!(
                "{} exists, taking no action",
                self.desired.path.display()
            );
            return Ok(());
        }
        self.action_create(reporter)
    }

    fn action_delete(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<()> {
        if !self.desired.path.exists() {
            return Ok(());
        }

        let path = self.desired.path.clone();
        // a symlink alias carries no content of its own to preserve
        let is_symlink = path
            .symlink_metadata()
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        let keeper = BackupKeeper::new(self.config);

        converge_by(
            self.config,
            &mut self.records,
            reporter,
            vec![format!("delete file {}", path.display())],
            || {
                if !is_symlink {
                    keeper.backup(&path)?;
                }
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete {}", path.display()))?;
                log::info!("deleted file {}", path.display());
                Ok(())
            },
        )
    }

    fn action_touch(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<()> {
        self.action_create(reporter)?;

        let path = self.desired.path.clone();
        converge_by(
            self.config,
            &mut self.records,
            reporter,
            vec![format!("update utime on file {}", path.display())],
            || {
                let now = SystemTime::now();
                let file = fs::OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open {} for touch", path.display()))?;
                file.set_times(
                    fs::FileTimes::new().set_accessed(now).set_modified(now),
                )
                .with_context(|| format!("Failed to update times on {}", path.display()))?;
                log::info!("updated atime and mtime on {}", path.display());
                Ok(())
            },
        )
    }

    /// Always leaves a destination for the later steps to diff and back up
    /// against.
    fn do_create_file(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<()> {
        if self.desired.path.exists() {
            return Ok(());
        }

        let path = self.desired.path.clone();
        let strategy = &self.strategy;
        converge_by(
            self.config,
            &mut self.records,
            reporter,
            vec![format!("create new file {}", path.display())],
            || {
                strategy.create(&path)?;
                log::info!("created file {}", path.display());
                Ok(())
            },
        )
    }

    fn do_content_changes(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<()> {
        // no staged artifact is fine: no content or no new content requested
        let Some(staged) = self.content.resolve()? else {
            return Ok(());
        };

        // a staging file that vanished between resolution and deployment is
        // an upstream defect, never recoverable
        if !staged.path().exists() {
            return Err(ConvergeError::StagedArtifactMissing {
                path: self.desired.path.clone(),
            }
            .into());
        }

        let staged_checksum = checksum_file(staged.path())?;
        if self.observed.checksum.as_deref() != Some(staged_checksum.as_str()) {
            let mut description = vec![format!(
                "update content in file {} from {} to {}",
                self.desired.path.display(),
                short_checksum(self.observed.checksum.as_deref()),
                short_checksum(Some(&staged_checksum)),
            )];
            description.extend(
                Differ::new(self.config)
                    .diff(&self.desired.path, staged.path())
                    .to_lines(),
            );

            let path = self.desired.path.clone();
            let staged_path = staged.path().to_path_buf();
            let strategy = &self.strategy;
            let keeper = BackupKeeper::new(self.config);
            converge_by(
                self.config,
                &mut self.records,
                reporter,
                description,
                || {
                    // the destination was created above, so there is always
                    // something to preserve
                    if path.exists() {
                        keeper.backup(&path)?;
                    }
                    strategy.deploy(&staged_path, &path)?;
                    log::info!("updated file contents {}", path.display());
                    Ok(())
                },
            )?;
        }

        // unlink here keeps dry-run from leaving staging files behind; the
        // artifact's drop guard covers the error paths above
        staged.dispose()?;
        Ok(())
    }

    fn do_access_changes(&mut self, reporter: &mut dyn ConvergeReporter) -> Result<()> {
        let Some(access) = &self.access else {
            return Ok(());
        };
        if !access.requires_changes()? {
            return Ok(());
        }

        let description = access.describe_changes();
        converge_by(
            self.config,
            &mut self.records,
            reporter,
            description,
            || access.apply_all(),
        )
    }
}

/// The converge boundary: record a named change, execute it unless the pass
/// only simulates.
fn converge_by(
    config: &ConvergeConfig,
    records: &mut Vec<ConvergeRecord>,
    reporter: &mut dyn ConvergeReporter,
    description: Vec<String>,
    action: impl FnOnce() -> Result<()>,
) -> Result<()> {
    if config.dry_run {
        if let Some(headline) = description.first() {
            log::info!("Would {headline}");
        }
    } else {
        action()?;
    }

    let record = ConvergeRecord {
        description,
        applied: !config.dry_run,
    };
    reporter.on_converge(&record);
    records.push(record);
    Ok(())
}
