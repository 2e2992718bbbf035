//! Watcher error types.

use std::path::PathBuf;

/// Errors that can occur while watching or reading the log file.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Log file does not exist (yet, or any more).
    #[error("Log file not found: {0}")]
    FileMissing(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Could not establish the directory watch.
    #[error("Cannot watch {path}: {source}")]
    WatchFailed {
        path: PathBuf,
        source: notify::Error,
    },

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatcherError {
    /// Whether the error only affects the current read and monitoring can go on.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FileMissing(_) | Self::PermissionDenied(_) | Self::Io(_)
        )
    }
}
