//! Error taxonomy for digest computation, persistence and watching.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The watch root does not resolve to an existing directory.
    #[error("{} is not a directory", path.display())]
    InvalidDirectory { path: PathBuf },

    /// A file could not be read in full.
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The extended attribute could not be stored. Only ever logged.
    #[error("extended attribute not stored on {}: {reason}", path.display())]
    AttributeUnsupported { path: PathBuf, reason: String },

    #[error("could not write sidecar {}: {source}", path.display())]
    SidecarWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The current digest differs from the sidecar, or the sidecar is missing.
    #[error(
        "{} digest mismatch (expected {}, actual {actual})",
        path.display(),
        expected.as_deref().unwrap_or("missing")
    )]
    VerifyMismatch {
        path: PathBuf,
        expected: Option<String>,
        actual: String,
    },

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    /// Fatal errors end the whole run; everything else is isolated to one file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::InvalidDirectory { .. } | MonitorError::Watch(_) | MonitorError::Config(_)
        )
    }

    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MonitorError::Read {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
