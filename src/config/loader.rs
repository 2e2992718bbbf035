//! Configuration file loader.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::MonitorConfig;

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".log-issue-monitor.toml";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .log-issue-monitor.toml
        search_paths.push(PathBuf::from(LOCAL_CONFIG_FILE));

        // 2. User config directory: ~/.config/log-issue-monitor/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("log-issue-monitor").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// Environment overrides are not applied; see [`ConfigLoader::load_with_env`].
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(&self) -> Result<MonitorConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(MonitorConfig::default())
    }

    /// Load configuration and apply process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or an override is invalid.
    pub fn load_with_env(&self) -> Result<MonitorConfig, ConfigError> {
        let mut config = self.load()?;
        apply_env(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &Path) -> Result<MonitorConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment overrides using `lookup` to resolve variables.
///
/// Empty values are ignored. The token is read from `tracker.token_env`
/// when not already set in the file.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when a numeric or level override
/// cannot be parsed.
pub fn apply_env<F>(config: &mut MonitorConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if config.tracker.token.is_empty() {
        if let Some(token) = get(&config.tracker.token_env) {
            config.tracker.token = token;
        }
    }
    if let Some(owner) = get("GITHUB_OWNER") {
        config.tracker.owner = owner;
    }
    if let Some(repo) = get("GITHUB_REPO") {
        config.tracker.repository = repo;
    }
    if let Some(enabled) = get("GITHUB_ISSUES_ENABLED") {
        config.enabled = parse_bool("GITHUB_ISSUES_ENABLED", &enabled)?;
    }
    if let Some(v) = get("GITHUB_ISSUES_POLL_INTERVAL") {
        config.monitoring.poll_interval = parse_value("GITHUB_ISSUES_POLL_INTERVAL", &v)?;
    }
    if let Some(v) = get("GITHUB_ISSUES_BUFFER_SIZE") {
        config.monitoring.buffer_size = parse_value("GITHUB_ISSUES_BUFFER_SIZE", &v)?;
    }
    if let Some(v) = get("GITHUB_ISSUES_DEDUPE_TIMEOUT") {
        config.monitoring.dedupe_window = parse_value("GITHUB_ISSUES_DEDUPE_TIMEOUT", &v)?;
    }
    if let Some(v) = get("GITHUB_ISSUES_MIN_LEVEL") {
        config.filters.min_level = parse_value("GITHUB_ISSUES_MIN_LEVEL", &v)?;
    }

    Ok(())
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}
