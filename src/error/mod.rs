//! Error types and Result aliases for ctxpack.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using ctxpack's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ctxpack operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Directory scanning error.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// Aggregation pipeline error.
    #[error("aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    /// Preference store error.
    #[error("preferences error: {0}")]
    Preferences(String),

    /// Tokenizer loading or encoding error.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Delivery sink error.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Directory scanning errors.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The scan root could not be opened. No partial entry list is produced.
    #[error("cannot read root directory '{path}': {reason}")]
    RootUnreadable { path: String, reason: String },

    /// Expansion was requested for something that is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

/// Aggregation pipeline errors.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// One or more selected files could not be read. The document still
    /// holds every file that was read successfully.
    #[error("{failed} of {total} files failed, last error: {last}")]
    FilesFailed {
        failed: usize,
        total: usize,
        last: String,
    },

    /// The run was cancelled before all files were read. `abandoned`
    /// counts files that were never started.
    #[error("aggregation cancelled after {completed} files, {abandoned} abandoned")]
    Cancelled { completed: usize, abandoned: usize },

    /// Worker pool error.
    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// Document rendering error.
    #[error("render error: {0}")]
    Render(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors that still come with a usable document.
    #[must_use]
    pub const fn is_partial_success(&self) -> bool {
        matches!(self, Self::Aggregate(AggregateError::FilesFailed { .. }))
    }
}

impl ScanError {
    /// Create a root-unreadable error.
    pub fn root_unreadable(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::RootUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
