//! Timestamp-based staleness rule
//!
//! A set of outputs is up to date when every input and every output exists
//! and the newest input is strictly older than the oldest output. An empty
//! input or output set is never up to date, and an unreadable timestamp counts
//! as missing. Equal timestamps are stale.
//!
//! Nothing here hashes contents or reads dependency files.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

/// Why a set of files is, or is not, up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Every output is newer than every input
    UpToDate,
    /// No inputs were declared
    NoInputs,
    /// No outputs were declared
    NoOutputs,
    /// An input has no readable timestamp
    MissingInput(PathBuf),
    /// An output has no readable timestamp
    MissingOutput(PathBuf),
    /// An input is at least as new as an output
    Outdated {
        newest_input: PathBuf,
        oldest_output: PathBuf,
    },
}

impl Freshness {
    /// Whether the work may be skipped
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "up to date"),
            Self::NoInputs => write!(f, "no inputs declared"),
            Self::NoOutputs => write!(f, "no outputs declared"),
            Self::MissingInput(path) => write!(f, "missing input {}", path.display()),
            Self::MissingOutput(path) => write!(f, "missing output {}", path.display()),
            Self::Outdated {
                newest_input,
                oldest_output,
            } => write!(
                f,
                "{} is not older than {}",
                newest_input.display(),
                oldest_output.display()
            ),
        }
    }
}

/// Modification time of a file, `None` if it is missing or unreadable
pub fn modification_time(path: &Path) -> Option<SystemTime> {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => Some(time),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "timestamp unknown");
            None
        }
    }
}

/// Decide whether `outputs` are still valid for `inputs`
pub fn check(inputs: &[PathBuf], outputs: &[PathBuf]) -> Freshness {
    if inputs.is_empty() {
        return Freshness::NoInputs;
    }
    if outputs.is_empty() {
        return Freshness::NoOutputs;
    }

    let mut oldest_output: Option<(SystemTime, &PathBuf)> = None;
    for output in outputs {
        let Some(time) = modification_time(output) else {
            return Freshness::MissingOutput(output.clone());
        };
        if oldest_output.map_or(true, |(oldest, _)| time < oldest) {
            oldest_output = Some((time, output));
        }
    }

    let mut newest_input: Option<(SystemTime, &PathBuf)> = None;
    for input in inputs {
        let Some(time) = modification_time(input) else {
            return Freshness::MissingInput(input.clone());
        };
        if newest_input.map_or(true, |(newest, _)| time > newest) {
            newest_input = Some((time, input));
        }
    }

    match (newest_input, oldest_output) {
        (Some((newest, _)), Some((oldest, _))) if newest < oldest => Freshness::UpToDate,
        (Some((_, input)), Some((_, output))) => Freshness::Outdated {
            newest_input: input.clone(),
            oldest_output: output.clone(),
        },
        // both sets are non-empty, so both were assigned
        _ => Freshness::NoInputs,
    }
}

/// Whether `outputs` are still valid for `inputs`
pub fn is_up_to_date(inputs: &[PathBuf], outputs: &[PathBuf]) -> bool {
    check(inputs, outputs).is_up_to_date()
}

/// Set a file's modification time to now without changing its content
pub fn touch(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(SystemTime::now())
}

/// Touch every path, logging failures. Returns the number of files touched.
pub fn touch_all(paths: &[PathBuf]) -> usize {
    let mut touched = 0;
    for path in paths {
        match touch(path) {
            Ok(()) => touched += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "declared output was not produced");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to refresh timestamp");
            }
        }
    }
    touched
}
