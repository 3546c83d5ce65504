//! Error types for the cell partitioning pipeline.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeocellsError>;

#[derive(Debug, Error)]
pub enum GeocellsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record in one of the pipeline's text files could not be parsed.
    /// `line` is 1-based.
    #[error("malformed record at {}:{line}: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid cache file format")]
    InvalidFormat,

    #[error("configuration {0} has no class meeting the population threshold")]
    EmptyConfiguration(u16),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl GeocellsError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for GeocellsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(feature = "snapshot")]
impl From<bincode::Error> for GeocellsError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for GeocellsError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool(e.to_string())
    }
}
