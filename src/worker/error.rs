use std::path::PathBuf;
use thiserror::Error;

use crate::booru::BooruError;
use crate::config::ConfigError;

/// Errors that end a worker
///
/// Recoverable conditions never reach this type; they become transient
/// status text on the worker's state instead.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Booru(#[from] BooruError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl WorkerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WorkerError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
