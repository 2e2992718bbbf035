//! Monitor lifecycle and run loop.

use std::future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::tracker::{GitHubClient, IssueTracker};
use crate::watcher::{FileWatcher, LogTailer, WatchEvent, WatcherError};

use super::buffer::Batch;
use super::error::MonitorError;
use super::pipeline::Pipeline;
use super::reporter::IssueReporter;

/// Lower bound for timer periods; tokio intervals reject zero.
const MIN_TICK: Duration = Duration::from_millis(50);

/// Lifecycle state of a [`MonitorController`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MonitorState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Snapshot of monitor progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub path: PathBuf,
    /// Bytes of the log file consumed so far.
    pub offset: u64,
    /// Records parsed but not yet handed to the reporter.
    pub pending: usize,
    /// Records turned into issues or comments.
    pub reported: u64,
    /// Records dropped after a failed tracker call.
    pub failed: u64,
    /// Repeats suppressed within the dedupe window.
    pub suppressed: u64,
}

/// Background tasks of a running monitor.
struct RunHandle {
    cancel: CancellationToken,
    run_task: JoinHandle<()>,
    report_task: JoinHandle<()>,
}

/// Owns the monitoring run: tailer, pipeline and reporter worker.
///
/// `Stopped → Starting → Running → Stopping → Stopped`. All tail and buffer
/// state lives in the run loop task; reporting happens on a separate worker
/// so slow tracker calls never block file reads.
pub struct MonitorController {
    config: MonitorConfig,
    tracker: Arc<dyn IssueTracker>,
    state: MonitorState,
    status_tx: Arc<watch::Sender<MonitorStatus>>,
    run: Option<RunHandle>,
}

impl std::fmt::Debug for MonitorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorController")
            .field("state", &self.state)
            .field("path", &self.config.monitoring.log_file)
            .finish_non_exhaustive()
    }
}

impl MonitorController {
    /// Create a controller using the given tracker.
    #[must_use]
    pub fn new(config: MonitorConfig, tracker: Arc<dyn IssueTracker>) -> Self {
        let status = MonitorStatus {
            path: config.monitoring.log_file.clone(),
            ..MonitorStatus::default()
        };
        let (status_tx, _) = watch::channel(status);
        Self {
            config,
            tracker,
            state: MonitorState::Stopped,
            status_tx: Arc::new(status_tx),
            run: None,
        }
    }

    /// Create a controller with a GitHub tracker built from `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when credentials are missing, or a
    /// tracker error when the client cannot be built.
    pub fn from_config(config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate_tracker()?;
        let tracker = GitHubClient::from_config(&config.tracker)?;
        Ok(Self::new(config, Arc::new(tracker)))
    }

    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Latest status snapshot.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        self.status_tx.borrow().clone()
    }

    /// Receiver that observes every status update.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Check tracker connectivity without touching the monitoring state.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when tracker credentials are missing.
    pub async fn test_connection(&self) -> Result<bool, MonitorError> {
        self.config.validate_tracker()?;
        Ok(self.tracker.test_connection().await)
    }

    /// Begin monitoring. Calling it while running is a no-op.
    ///
    /// Existing file content is skipped; only lines appended afterwards are
    /// considered.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when required settings are missing and a
    /// watch error when the log directory cannot be watched. The controller
    /// stays `Stopped` in both cases.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        if self.run.is_some() {
            tracing::debug!("Monitor already running");
            return Ok(());
        }
        if !self.config.enabled {
            tracing::info!("Monitoring disabled in configuration, not starting");
            return Ok(());
        }
        self.config.validate()?;

        self.transition(MonitorState::Starting);
        match self.spawn().await {
            Ok(run) => {
                self.run = Some(run);
                self.transition(MonitorState::Running);
                tracing::info!(
                    path = %self.config.monitoring.log_file.display(),
                    "Log monitoring started"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to start log monitoring");
                self.transition(MonitorState::Stopped);
                Err(e)
            }
        }
    }

    /// Stop monitoring, reporting every buffered record first.
    ///
    /// Waits for in-flight tracker calls to finish or time out. Calling it
    /// while stopped is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Join` if a background task panicked.
    pub async fn stop(&mut self) -> Result<(), MonitorError> {
        let Some(run) = self.run.take() else {
            return Ok(());
        };

        self.transition(MonitorState::Stopping);
        run.cancel.cancel();
        let run_result = run.run_task.await;
        let report_result = run.report_task.await;
        self.transition(MonitorState::Stopped);
        tracing::info!("Log monitoring stopped");

        run_result?;
        report_result?;
        Ok(())
    }

    fn transition(&mut self, new_state: MonitorState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
        self.status_tx.send_modify(|s| s.state = new_state);
    }

    async fn spawn(&self) -> Result<RunHandle, MonitorError> {
        let path = self.config.monitoring.log_file.clone();
        let tailer = match LogTailer::at_end(path.clone()).await {
            Ok(tailer) => tailer,
            Err(WatcherError::FileMissing(_)) => {
                tracing::warn!(
                    path = %path.display(),
                    "Log file does not exist yet, will read it from the start once created"
                );
                LogTailer::new(path.clone())
            }
            Err(e) => return Err(e.into()),
        };
        let (watcher, events) = FileWatcher::new(path)?;

        let cancel = CancellationToken::new();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let reporter = IssueReporter::new(Arc::clone(&self.tracker), self.config.issue.clone());

        self.status_tx.send_modify(|s| s.offset = tailer.offset());

        let report_task = tokio::spawn(report_worker(
            reporter,
            batch_rx,
            Arc::clone(&self.status_tx),
        ));

        let run_loop = RunLoop {
            pipeline: Pipeline::from_config(&self.config, Instant::now()),
            tailer,
            watcher,
            events,
            batch_tx,
            status_tx: Arc::clone(&self.status_tx),
            read_error_logged: false,
        };
        let run_task = tokio::spawn(run_loop.run(
            cancel.clone(),
            self.config.monitoring.poll_interval(),
            self.config.monitoring.rescan_interval(),
        ));

        Ok(RunHandle {
            cancel,
            run_task,
            report_task,
        })
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.cancel.cancel();
        }
    }
}

/// State owned by the run loop task.
struct RunLoop {
    pipeline: Pipeline,
    tailer: LogTailer,
    watcher: FileWatcher,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    batch_tx: mpsc::UnboundedSender<Batch>,
    status_tx: Arc<watch::Sender<MonitorStatus>>,
    read_error_logged: bool,
}

impl RunLoop {
    async fn run(
        mut self,
        cancel: CancellationToken,
        poll_interval: Duration,
        rescan_interval: Option<Duration>,
    ) {
        let mut flush_tick = interval(poll_interval.max(MIN_TICK));
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut rescan_tick = rescan_interval.map(|period| {
            let mut tick = interval(period.max(MIN_TICK));
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick
        });
        let mut events_open = true;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = self.events.recv(), if events_open => match event {
                    Some(WatchEvent::Changed) => self.read_file().await,
                    Some(WatchEvent::Removed) => {
                        tracing::debug!(path = %self.tailer.path().display(), "Log file removed");
                    }
                    Some(WatchEvent::Error(e)) => {
                        tracing::warn!(error = %e, "File watcher error");
                    }
                    None => {
                        tracing::warn!("File watcher stopped, relying on periodic rescans");
                        events_open = false;
                    }
                },
                _ = flush_tick.tick() => {
                    if let Some(batch) = self.pipeline.tick(Instant::now()) {
                        self.send(batch);
                    }
                }
                () = next_tick(&mut rescan_tick) => {
                    self.read_file().await;
                    if let Some(batch) = self.pipeline.tick(Instant::now()) {
                        self.send(batch);
                    }
                }
            }
            self.publish();
        }

        // Stopping: no more reads, hand over everything still buffered.
        self.watcher.stop();
        let remaining = self.pipeline.drain(Instant::now());
        if !remaining.is_empty() {
            tracing::info!(count = remaining.len(), "Flushing buffered errors before stop");
            self.send(remaining);
        }
        self.publish();
    }

    async fn read_file(&mut self) {
        match self.tailer.read_new_lines().await {
            Ok(lines) => {
                self.read_error_logged = false;
                if lines.is_empty() {
                    return;
                }
                tracing::trace!(count = lines.len(), offset = self.tailer.offset(), "Read new lines");
                for batch in self.pipeline.ingest(lines, Instant::now()) {
                    self.send(batch);
                }
            }
            Err(e) if e.is_transient() => {
                let path = self.tailer.path().display();
                if self.read_error_logged {
                    tracing::debug!(path = %path, error = %e, "Log file still unreadable");
                } else {
                    tracing::warn!(path = %path, error = %e, "Failed to read log file, skipping");
                    self.read_error_logged = true;
                }
            }
            Err(e) => {
                tracing::error!(
                    path = %self.tailer.path().display(),
                    error = %e,
                    "Unexpected error reading log file"
                );
            }
        }
    }

    fn send(&self, batch: Batch) {
        let count = batch.len();
        if self.batch_tx.send(batch).is_err() {
            tracing::error!(count, "Reporter worker gone, dropping batch");
        }
    }

    fn publish(&self) {
        let offset = self.tailer.offset();
        let pending = self.pipeline.pending_len();
        let suppressed = self.pipeline.stats().suppressed;
        self.status_tx.send_if_modified(|s| {
            let changed = s.offset != offset || s.pending != pending || s.suppressed != suppressed;
            s.offset = offset;
            s.pending = pending;
            s.suppressed = suppressed;
            changed
        });
    }
}

/// Resolve on the next tick, or never when rescans are disabled.
async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => future::pending().await,
    }
}

/// Report batches in arrival order until the run loop hangs up.
async fn report_worker(
    reporter: IssueReporter,
    mut batch_rx: mpsc::UnboundedReceiver<Batch>,
    status_tx: Arc<watch::Sender<MonitorStatus>>,
) {
    while let Some(batch) = batch_rx.recv().await {
        tracing::debug!(count = batch.len(), "Reporting batch");
        let summary = reporter.report(batch).await;
        status_tx.send_modify(|s| {
            s.reported += (summary.created + summary.commented) as u64;
            s.failed += summary.failed as u64;
        });
    }
}
