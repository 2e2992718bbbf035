//! Directory watcher with notify integration.
//!
//! Watches the directory containing the log file and signals when the file
//! itself changes. Reading is left to the receiver so that all tail state is
//! mutated from one place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, RecursiveMode},
    DebounceEventResult,
};
use tokio::sync::mpsc;

use super::error::WatcherError;

/// Debounce window for filesystem notifications.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// How often the bridge thread checks for a stop request.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Events emitted by the file watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// The file was created, written to, or renamed into place.
    Changed,
    /// The file was removed or renamed away.
    Removed,
    /// The notification backend reported an error.
    Error(WatcherError),
}

/// Watches a single file through its parent directory.
///
/// Uses notify-debouncer-full for filesystem events and bridges them to a
/// tokio mpsc channel. A burst of writes may produce several `Changed`
/// events; consumers read by offset so repeats are harmless.
#[derive(Debug)]
pub struct FileWatcher {
    /// The file being watched.
    path: PathBuf,
    /// Handle to stop the bridge thread.
    stop_tx: Option<std_mpsc::Sender<()>>,
}

impl FileWatcher {
    /// Start watching `path`'s parent directory.
    ///
    /// Returns the watcher and a receiver for watch events.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::WatchFailed` if the directory watch cannot be
    /// established (missing directory, permissions, watch limits).
    pub fn new(path: PathBuf) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), WatcherError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (notify_tx, notify_rx) = std_mpsc::channel();

        let watch_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| WatcherError::WatchFailed {
                path: path.clone(),
                source: notify::Error::generic("path has no file name"),
            })?;

        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result| {
            let _ = notify_tx.send(result);
        })
        .map_err(|source| WatcherError::WatchFailed {
            path: watch_dir.clone(),
            source,
        })?;

        debouncer
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::WatchFailed {
                path: watch_dir.clone(),
                source,
            })?;

        tracing::debug!(dir = %watch_dir.display(), "Watching log directory");

        // Bridge thread: forwards std_mpsc notifications to tokio mpsc.
        // Detached; it exits within STOP_POLL of a stop request and drops
        // the debouncer and event sender on the way out.
        thread::spawn(move || {
            loop {
                if stop_rx.try_recv().is_ok() {
                    break;
                }

                match notify_rx.recv_timeout(STOP_POLL) {
                    Ok(result) => {
                        if !Self::forward(result, &file_name, &event_tx) {
                            break;
                        }
                    }
                    Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }

            // Keep debouncer alive until thread exits
            drop(debouncer);
        });

        Ok((
            Self {
                path,
                stop_tx: Some(stop_tx),
            },
            event_rx,
        ))
    }

    /// Forward one debounce result. Returns false once the receiver is gone.
    fn forward(
        result: DebounceEventResult,
        file_name: &OsString,
        event_tx: &mpsc::UnboundedSender<WatchEvent>,
    ) -> bool {
        match result {
            Ok(events) => {
                for event in &events {
                    if let Some(watch_event) = Self::classify(event, file_name) {
                        if event_tx.send(watch_event).is_err() {
                            return false;
                        }
                    }
                }
                true
            }
            Err(errors) => errors.into_iter().all(|error| {
                event_tx
                    .send(WatchEvent::Error(WatcherError::Notify(error)))
                    .is_ok()
            }),
        }
    }

    /// Map a notify event to a watch event if it concerns our file.
    fn classify(
        event: &notify_debouncer_full::DebouncedEvent,
        file_name: &OsString,
    ) -> Option<WatchEvent> {
        use notify::EventKind;

        let affects_file = event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()));
        if !affects_file {
            return None;
        }

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => Some(WatchEvent::Changed),
            EventKind::Remove(_) => Some(WatchEvent::Removed),
            _ => None,
        }
    }

    /// Get the file being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ask the bridge thread to release the directory watch. Does not block;
    /// the event receiver closes once the thread has exited.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
            tracing::debug!(path = %self.path.display(), "Stopping log file watcher");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
