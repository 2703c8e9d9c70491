//! Unified diffs with safety thresholds.

use crate::config::ConvergeConfig;
use similar::TextDiff;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// The `\ No newline at end of file` marker emitted by unified diff output.
const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Outcome of a diff request.
///
/// Expected conditions (disabled by config, oversized files, binary content,
/// tool trouble) come back as [`DiffReport::Suppressed`] with an explanation,
/// never as errors. Always displayable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffReport {
    /// Unified diff, one element per line.
    Lines(Vec<String>),
    /// No diff shown; the string explains why.
    Suppressed(String),
}

impl DiffReport {
    /// Render for humans; suppressed reports collapse to their explanation.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            Self::Lines(lines) => lines.clone(),
            Self::Suppressed(reason) => vec![reason.clone()],
        }
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines(lines) => write!(f, "{}", lines.join("\n")),
            Self::Suppressed(reason) => write!(f, "{reason}"),
        }
    }
}

/// Produces unified diffs between the current and staged content, applying
/// the configured safety policy before any line is generated.
pub struct Differ<'a> {
    config: &'a ConvergeConfig,
}

impl<'a> Differ<'a> {
    pub fn new(config: &'a ConvergeConfig) -> Self {
        Self { config }
    }

    /// Diff `old` against `new`, short-circuiting at the first policy match.
    pub fn diff(&self, old: &Path, new: &Path) -> DiffReport {
        if self.config.diff_disabled {
            return DiffReport::Suppressed("(diff output suppressed by config)".to_string());
        }

        let threshold = self.config.diff_filesize_threshold;
        let (old_size, new_size) = match (file_size(old), file_size(new)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(err), _) | (_, Err(err)) => {
                return DiffReport::Suppressed(format!("Could not determine diff. Error: {err}"));
            }
        };
        if old_size > threshold || new_size > threshold {
            return DiffReport::Suppressed(format!(
                "(file sizes exceed {threshold} bytes, diff output suppressed)"
            ));
        }

        match is_binary(old, threshold) {
            Ok(true) => {
                return DiffReport::Suppressed(
                    "(current file is binary, diff output suppressed)".to_string(),
                );
            }
            Err(err) => {
                return DiffReport::Suppressed(format!("Could not determine diff. Error: {err}"));
            }
            Ok(false) => {}
        }
        match is_binary(new, threshold) {
            Ok(true) => {
                return DiffReport::Suppressed(
                    "(new content is binary, diff output suppressed)".to_string(),
                );
            }
            Err(err) => {
                return DiffReport::Suppressed(format!("Could not determine diff. Error: {err}"));
            }
            Ok(false) => {}
        }

        let (old_text, new_text) = match (fs::read(old), fs::read(new)) {
            (Ok(a), Ok(b)) => (
                String::from_utf8_lossy(&a).into_owned(),
                String::from_utf8_lossy(&b).into_owned(),
            ),
            (Err(err), _) | (_, Err(err)) => {
                return DiffReport::Suppressed(format!("Could not determine diff. Error: {err}"));
            }
        };

        let text_diff = TextDiff::from_lines(&old_text, &new_text);
        let output = text_diff
            .unified_diff()
            .context_radius(3)
            .header(&old.display().to_string(), &new.display().to_string())
            .to_string();

        if output.is_empty() {
            // identical bytes and changes the tool does not surface are
            // deliberately merged into one answer
            return DiffReport::Suppressed("(no diff)".to_string());
        }
        if output.len() > self.config.diff_output_threshold {
            return DiffReport::Suppressed(format!(
                "(long diff of over {} characters, diff output suppressed)",
                self.config.diff_output_threshold
            ));
        }

        let mut lines: Vec<String> = output.lines().map(str::to_string).collect();
        lines.retain(|line| line != NO_NEWLINE_MARKER);
        DiffReport::Lines(lines)
    }
}

fn file_size(path: &Path) -> io::Result<u64> {
    Ok(fs::metadata(path)?.len())
}

/// Sample a prefix of the file, up to the configured size threshold; any
/// control byte outside ordinary text marks the file binary.
fn is_binary(path: &Path, sample_limit: u64) -> io::Result<bool> {
    let file = fs::File::open(path)?;
    let mut sample = Vec::new();
    file.take(sample_limit).read_to_end(&mut sample)?;
    Ok(sample
        .iter()
        .any(|&b| (b < 0x20 && !matches!(b, b'\t' | b'\r' | b'\n')) || b == 0x7f))
}
