//! Log file watching and incremental reading.
//!
//! [`FileWatcher`] signals changes to a single file, [`LogTailer`] reads the
//! complete lines appended since the last read.

mod error;
mod file_watcher;
mod tailer;

pub use error::WatcherError;
pub use file_watcher::{FileWatcher, WatchEvent};
pub use tailer::{FileIdentity, LogTailer, TailState};
