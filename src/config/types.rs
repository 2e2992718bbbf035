//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::Severity;

use super::ConfigError;

/// Issue tracker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL of the GitHub REST API.
    pub api_url: String,
    /// Access token. Usually left empty and resolved from `token_env`.
    pub token: String,
    /// Environment variable holding the access token.
    pub token_env: String,
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: String::new(),
            token_env: "GITHUB_TOKEN".to_string(),
            owner: String::new(),
            repository: String::new(),
            timeout_secs: 30,
        }
    }
}

impl TrackerConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Log file to tail.
    pub log_file: PathBuf,
    /// Maximum time a buffered record waits before being reported, in seconds.
    pub poll_interval: u64,
    /// Number of buffered records that triggers an immediate flush.
    pub buffer_size: usize,
    /// Window during which a repeated error is suppressed, in seconds.
    pub dedupe_window: u64,
    /// Fallback size poll for missed notifications, in milliseconds. 0 disables it.
    pub rescan_interval_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("storage/logs/laravel.log"),
            poll_interval: 1,
            buffer_size: 10,
            dedupe_window: 3600,
            rescan_interval_ms: 1000,
        }
    }
}

impl MonitoringConfig {
    /// Flush interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Deduplication window as a [`Duration`].
    #[must_use]
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_secs(self.dedupe_window)
    }

    /// Fallback rescan interval, `None` when disabled.
    #[must_use]
    pub fn rescan_interval(&self) -> Option<Duration> {
        (self.rescan_interval_ms > 0).then(|| Duration::from_millis(self.rescan_interval_ms))
    }
}

/// How created issues look.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueConfig {
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    /// Prepended to every issue title.
    pub title_prefix: String,
    /// Maximum number of message characters used in the title.
    pub title_max_len: usize,
    pub include_stack_trace: bool,
    pub include_request_info: bool,
    /// Comment on a matching open issue instead of opening a new one.
    pub reuse_open_issues: bool,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            labels: vec!["bug".to_string(), "auto-generated".to_string()],
            assignees: Vec::new(),
            title_prefix: "[Auto] ".to_string(),
            title_max_len: 72,
            include_stack_trace: true,
            include_request_info: true,
            reuse_open_issues: false,
        }
    }
}

/// Which log entries are considered at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lowest severity that gets reported.
    pub min_level: Severity,
    /// Lines containing any of these substrings are ignored.
    pub exclude_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_level: Severity::Error,
            exclude_patterns: vec!["/vendor/".to_string(), "StreamHandler.php".to_string()],
        }
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Master switch; when false `start` does nothing.
    pub enabled: bool,
    pub tracker: TrackerConfig,
    pub monitoring: MonitoringConfig,
    pub issue: IssueConfig,
    pub filters: FilterConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tracker: TrackerConfig::default(),
            monitoring: MonitoringConfig::default(),
            issue: IssueConfig::default(),
            filters: FilterConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Check that everything needed to start monitoring is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first absent setting, or
    /// `ConfigError::InvalidValue` for a zero buffer size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_tracker()?;
        if self.monitoring.log_file.as_os_str().is_empty() {
            return Err(ConfigError::Missing("monitoring.log_file"));
        }
        if self.monitoring.buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "monitoring.buffer_size".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Check only the tracker credentials, as needed for a connection test.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first absent setting.
    pub fn validate_tracker(&self) -> Result<(), ConfigError> {
        if self.tracker.token.trim().is_empty() {
            return Err(ConfigError::Missing("tracker.token"));
        }
        if self.tracker.owner.trim().is_empty() {
            return Err(ConfigError::Missing("tracker.owner"));
        }
        if self.tracker.repository.trim().is_empty() {
            return Err(ConfigError::Missing("tracker.repository"));
        }
        Ok(())
    }

    /// Copy with the token replaced, for printing.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.tracker.token.is_empty() {
            copy.tracker.token = "***".to_string();
        }
        copy
    }
}
