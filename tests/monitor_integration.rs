//! Integration tests for the monitor lifecycle against a real log file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log_issue_monitor::config::MonitorConfig;
use log_issue_monitor::monitor::{MonitorController, MonitorError, MonitorState};
use log_issue_monitor::tracker::{IssueRef, IssueTracker, NewIssue, TrackerError};
use tempfile::TempDir;

/// Tracker that records every issue and fails titles containing "boom".
#[derive(Default)]
struct RecordingTracker {
    issues: Mutex<Vec<NewIssue>>,
}

impl RecordingTracker {
    fn titles(&self) -> Vec<String> {
        self.issues
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.title.clone())
            .collect()
    }

    fn count(&self) -> usize {
        self.issues.lock().unwrap().len()
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRef, TrackerError> {
        if issue.title.contains("boom") {
            return Err(TrackerError::Http {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        let mut issues = self.issues.lock().unwrap();
        issues.push(issue.clone());
        Ok(IssueRef {
            number: issues.len() as u64,
            html_url: format!("https://github.com/acme/shop/issues/{}", issues.len()),
        })
    }

    async fn find_open_issue(&self, _fingerprint: &str) -> Result<Option<IssueRef>, TrackerError> {
        Ok(None)
    }

    async fn add_comment(&self, _issue: &IssueRef, _body: &str) -> Result<(), TrackerError> {
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        true
    }
}

fn test_config(log_file: PathBuf) -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.tracker.token = "ghp_test".to_string();
    config.tracker.owner = "acme".to_string();
    config.tracker.repository = "shop".to_string();
    config.monitoring.log_file = log_file;
    config.monitoring.poll_interval = 0;
    config.monitoring.rescan_interval_ms = 50;
    config
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open log file");
    file.write_all(text.as_bytes())
        .expect("Failed to append to log file");
}

async fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

#[tokio::test]
async fn test_error_with_stack_trace_becomes_issue() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("laravel.log");
    append(&log, "");

    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(test_config(log.clone()), tracker.clone());
    monitor.start().await.unwrap();

    append(
        &log,
        "[2024-01-01 10:00:00] local.ERROR: Database connection failed\n\
         [stacktrace]\n\
         #0 /app/Database/Connector.php(70): connect()\n",
    );

    assert!(wait_until(|| tracker.count() == 1).await);
    monitor.stop().await.unwrap();

    let issues = tracker.issues.lock().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "[Auto] Database connection failed");
    assert!(issues[0]
        .body
        .contains("#0 /app/Database/Connector.php(70): connect()"));
    assert_eq!(issues[0].labels, vec!["bug", "auto-generated"]);
}

#[tokio::test]
async fn test_repeated_error_reported_once() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "");

    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(test_config(log.clone()), tracker.clone());
    monitor.start().await.unwrap();

    let line = "[2024-01-01 10:00:00] local.ERROR: Payment gateway timeout\n";
    append(&log, line);
    assert!(wait_until(|| tracker.count() == 1).await);
    append(&log, line);
    assert!(wait_until(|| monitor.status().suppressed == 1).await);

    monitor.stop().await.unwrap();
    assert_eq!(tracker.count(), 1);
}

#[tokio::test]
async fn test_stop_flushes_pending_records() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "");

    let mut config = test_config(log.clone());
    config.monitoring.poll_interval = 3600;
    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(config, tracker.clone());
    monitor.start().await.unwrap();

    for name in ["alpha", "bravo", "charlie", "delta", "echo"] {
        append(
            &log,
            &format!("[2024-01-01 10:00:00] local.ERROR: Job {name} crashed\n"),
        );
    }
    assert!(wait_until(|| monitor.status().pending == 5).await);
    assert_eq!(tracker.count(), 0);

    monitor.stop().await.unwrap();
    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert_eq!(tracker.count(), 5);
    assert_eq!(monitor.status().reported, 5);
    assert_eq!(monitor.status().pending, 0);

    monitor.stop().await.unwrap();
    assert_eq!(tracker.count(), 5);
}

#[tokio::test]
async fn test_existing_content_not_replayed() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "[2024-01-01 09:00:00] local.ERROR: Old failure from yesterday\n");

    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(test_config(log.clone()), tracker.clone());
    monitor.start().await.unwrap();

    append(&log, "[2024-01-01 10:00:00] local.ERROR: Fresh failure\n");
    assert!(wait_until(|| tracker.count() == 1).await);
    monitor.stop().await.unwrap();

    assert_eq!(tracker.titles(), vec!["[Auto] Fresh failure"]);
}

#[tokio::test]
async fn test_failed_report_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "");

    let mut config = test_config(log.clone());
    config.monitoring.poll_interval = 3600;
    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(config, tracker.clone());
    monitor.start().await.unwrap();

    append(
        &log,
        "[2024-01-01 10:00:00] local.ERROR: Queue boom on worker\n\
         [2024-01-01 10:00:01] local.CRITICAL: Disk almost full\n",
    );
    assert!(wait_until(|| monitor.status().pending == 2).await);
    monitor.stop().await.unwrap();

    let status = monitor.status();
    assert_eq!(status.reported, 1);
    assert_eq!(status.failed, 1);
    assert_eq!(tracker.titles(), vec!["[Auto] Disk almost full"]);
}

#[tokio::test]
async fn test_truncated_file_read_from_start() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "");

    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(test_config(log.clone()), tracker.clone());
    monitor.start().await.unwrap();

    append(
        &log,
        "[2024-01-01 10:00:00] local.ERROR: Cache server unreachable on port 6379\n",
    );
    assert!(wait_until(|| tracker.count() == 1).await);

    std::fs::write(&log, "[2024-01-01 11:00:00] local.ERROR: Mail bounce\n").unwrap();
    assert!(wait_until(|| tracker.count() == 2).await);
    monitor.stop().await.unwrap();

    assert_eq!(
        tracker.titles(),
        vec![
            "[Auto] Cache server unreachable on port 6379",
            "[Auto] Mail bounce"
        ]
    );
}

#[tokio::test]
async fn test_info_lines_are_ignored() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "");

    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(test_config(log.clone()), tracker.clone());
    monitor.start().await.unwrap();

    append(
        &log,
        "[2024-01-01 10:00:00] local.INFO: User logged in\n\
         [2024-01-01 10:00:01] local.ERROR: Order sync failed\n",
    );
    assert!(wait_until(|| tracker.count() == 1).await);
    monitor.stop().await.unwrap();

    assert_eq!(tracker.titles(), vec!["[Auto] Order sync failed"]);
}

#[tokio::test]
async fn test_start_without_config_stays_stopped() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path().join("app.log"));
    config.tracker.repository.clear();

    let mut monitor = MonitorController::new(config, Arc::new(RecordingTracker::default()));
    let err = monitor.start().await.unwrap_err();
    assert!(matches!(err, MonitorError::Config(_)));
    assert!(err.to_string().contains("tracker.repository"));
    assert_eq!(monitor.state(), MonitorState::Stopped);
}

#[tokio::test]
async fn test_start_with_unwatchable_directory_fails() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().join("missing").join("app.log"));

    let mut monitor = MonitorController::new(config, Arc::new(RecordingTracker::default()));
    let err = monitor.start().await.unwrap_err();
    assert!(matches!(err, MonitorError::Watch(_)));
    assert_eq!(monitor.state(), MonitorState::Stopped);
}

#[tokio::test]
async fn test_log_file_created_after_start() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");

    let tracker = Arc::new(RecordingTracker::default());
    let mut monitor = MonitorController::new(test_config(log.clone()), tracker.clone());
    monitor.start().await.unwrap();
    assert_eq!(monitor.status().offset, 0);

    append(&log, "[2024-01-01 10:00:00] local.ERROR: Late starter\n");
    assert!(wait_until(|| tracker.count() == 1).await);
    monitor.stop().await.unwrap();
}
