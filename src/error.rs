use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Every failure the harness can report.
///
/// Resolution errors (`Usage`, `IndexOutOfRange`) are fatal at startup.
/// Everything else is raised per case and collected into a batch report.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("case index {index} out of range ({len} cases available)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("no input files found for case '{case}' in {}", .path.display())]
    EmptyInputSet { case: String, path: PathBuf },

    #[error("case '{case}': expected exactly one *.{extension} file for {flag}, found {found}")]
    MultipleOrMissingFile {
        case: String,
        flag: String,
        extension: String,
        found: usize,
    },

    #[error("could not clear previous results in {}: {source}", .path.display())]
    ResultsNotCleared {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("'{name}' exited with {status}")]
    ExternalToolFailure { name: String, status: ExitStatus },

    #[error("session control failed: {0}")]
    SessionControlFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
