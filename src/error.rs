use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised by the extraction, normalization and rename steps.
///
/// Absence (no stream, no match) is never an error: those are reported as
/// empty collections or `None` by the functions that find them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    NotSupported(String),

    #[error("unable to probe for subtitles")]
    NoSubtitles,

    #[error("{tool} not found; install it and make sure it is on PATH")]
    ToolMissing { tool: String },

    #[error("{tool} exited with code {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("destination {0:?} already exists; will not overwrite")]
    Collision(PathBuf),

    #[error("failed to parse subtitles in {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
