//! Monitor error types.

use crate::config::ConfigError;
use crate::tracker::TrackerError;
use crate::watcher::WatcherError;

/// Errors surfaced by the monitor lifecycle.
#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    /// Required settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The log file watch could not be established.
    #[error("Watch error: {0}")]
    Watch(#[from] WatcherError),

    /// The issue tracker client could not be created.
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// A background task panicked or was aborted.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
