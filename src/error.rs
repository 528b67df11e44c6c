//! Error types shared by the model, thumbnail and configuration layers

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DragboxError {
    #[error("Failed to enumerate {}: {source}", .path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    #[error("Failed to stat {}: {source}", .path.display())]
    StatFailed { path: PathBuf, source: io::Error },

    #[error("Failed to move {} to {}: {reason}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Failed to delete {}: {reason}", .path.display())]
    DeleteFailed { path: PathBuf, reason: String },

    #[error("Failed to decode {}: {reason}", .path.display())]
    DecodeFailed { path: PathBuf, reason: String },

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Index {index} out of bounds for listing of {count} entries")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Background runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DragboxError>;
