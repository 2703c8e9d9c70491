//! # Filekit
//!
//! A file convergence engine: declare the desired state of a file and
//! converge the on-disk state to match, with atomic deploys, rotated
//! backups, and safe diffs.
//!
//! Callers declare "this path should contain this content with these
//! attributes" and the engine computes the minimal set of actions to get
//! there, reporting what changed - or what would change in dry-run mode -
//! without the caller reasoning about atomicity, backups, or diffing.
//!
//! ## Core Concepts
//!
//! - **DesiredState**: what a path should look like (content, sources, mode)
//! - **ObservedState**: what the filesystem holds right now
//! - **StagedArtifact**: a temp file with the fully-resolved desired content
//! - **Converger**: the state machine reconciling observed with desired
//! - **DeployStrategy**: how staged content lands (move or copy)
//!
//! ## Example
//!
//! ```no_run
//! use filekit::{ConvergeConfig, Converger, DesiredState, FileAction, NullReporter};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ConvergeConfig::default();
//! let desired = DesiredState::new("/etc/motd", FileAction::Create)
//!     .with_content("managed by filekit\n")
//!     .with_mode(0o644);
//!
//! let mut converger = Converger::new(&config, desired)?;
//! let summary = converger.run(&mut NullReporter)?;
//! for record in &summary.records {
//!     println!("{}", record.description.join("\n"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborator Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`ContentResolver`]: produces the staged artifact (literal or remote)
//! - [`Fetcher`]: retrieves one locator scheme (HTTP and `file://` ship here)
//! - [`DeployStrategy`]: installs staged content ([`MoveDeploy`], [`CopyDeploy`])
//! - [`AccessControl`]: ownership/permission enforcement hook
//! - [`ConvergeReporter`]: receives converged and simulated change records
//!
//! This keeps the engine free of hard dependencies on the hosting tool's
//! resource model, reporting UI, and privilege machinery.

pub mod access;
pub mod backup;
pub mod checksum;
pub mod config;
pub mod content;
pub mod converge;
pub mod deploy;
pub mod diff;
pub mod error;
pub mod remote;
pub mod requirements;
pub mod state;

// Re-export main types at crate root
#[cfg(unix)]
pub use access::ModeControl;
pub use access::AccessControl;
pub use backup::BackupKeeper;
pub use checksum::{checksum_file, short_checksum};
pub use config::ConvergeConfig;
pub use content::{ContentResolver, InlineContent, StagedArtifact};
pub use converge::{ConvergeRecord, ConvergeReporter, ConvergeSummary, Converger, NullReporter};
pub use deploy::{CopyDeploy, DeployStrategy, MoveDeploy};
pub use diff::{DiffReport, Differ};
pub use error::ConvergeError;
pub use remote::{Fetcher, FileFetcher, HttpFetcher, RemoteContent};
pub use requirements::Requirements;
pub use state::{DesiredState, FileAction, ObservedState};
