//! Colored CLI display utilities for monitor output.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::config::MonitorConfig;
use crate::monitor::{MonitorState, MonitorStatus};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn state_label(state: MonitorState) -> String {
    match state {
        MonitorState::Running => "running".green().to_string(),
        MonitorState::Starting => "starting".yellow().to_string(),
        MonitorState::Stopping => "stopping".yellow().to_string(),
        MonitorState::Stopped => "stopped".dimmed().to_string(),
    }
}

/// Print monitor start information.
pub fn print_monitor_started(path: &Path, repo: &str) {
    println!(
        "{} {} watching {} -> {}",
        timestamp().dimmed(),
        "[MONITOR]".blue().bold(),
        path.display().cyan(),
        repo.cyan()
    );
    let _ = io::stdout().flush();
}

/// Print a one-line status summary.
pub fn print_status(status: &MonitorStatus) {
    let failed = if status.failed > 0 {
        status.failed.red().to_string()
    } else {
        status.failed.to_string()
    };
    println!(
        "{} {} {} offset={} pending={} reported={} suppressed={} failed={}",
        timestamp().dimmed(),
        "[MONITOR]".blue().bold(),
        state_label(status.state),
        status.offset,
        status.pending,
        status.reported.green(),
        status.suppressed.dimmed(),
        failed
    );
    let _ = io::stdout().flush();
}

/// Print tracker connection test result.
pub fn print_connection_test(repo: &str, success: bool) {
    let outcome = if success {
        "connected".green().to_string()
    } else {
        "failed".red().to_string()
    };
    println!(
        "{} {} {} - {}",
        timestamp().dimmed(),
        "[GITHUB]".magenta().bold(),
        repo.cyan(),
        outcome
    );
    let _ = io::stdout().flush();
}

/// Print which config file was loaded, if any.
pub fn print_config_source(path: Option<&Path>) {
    match path {
        Some(path) => println!("{} {}", "[CONFIG]".blue().bold(), path.display().cyan()),
        None => println!(
            "{} {}",
            "[CONFIG]".blue().bold(),
            "no config file found, using defaults".dimmed()
        ),
    }
}

/// Print the effective configuration with the token masked.
pub fn print_config(config: &MonitorConfig) {
    match toml::to_string_pretty(&config.redacted()) {
        Ok(text) => println!("{text}"),
        Err(e) => print_error(&format!("Failed to render configuration: {e}")),
    }
    let _ = io::stdout().flush();
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "[OK]".green().bold(), message);
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
