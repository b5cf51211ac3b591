use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The file is too short for the fat header it declares.
    #[error("malformed fat header in {}: {reason}", path.display())]
    MalformedHeader { path: PathBuf, reason: String },

    /// No enumerated architecture produced the requested display string.
    #[error("no architecture matches '{0}'")]
    SliceNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("external tool not found at {}", .0.display())]
    ToolNotFound(PathBuf),

    #[error("{program} exited with {status}")]
    CommandFailed { program: String, status: ExitStatus },

    /// The report connection closed without sending anything.
    #[error("decompiler never sent a report")]
    NoReport,

    /// The report stream closed before the named sentinel line arrived.
    #[error("report stream ended before {0}")]
    MissingSentinel(&'static str),

    #[error("invalid report payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
