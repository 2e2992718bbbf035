//! Log Issue Monitor - Turn application log errors into GitHub issues.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use log_issue_monitor::config::{ConfigLoader, MonitorConfig};
use log_issue_monitor::display;
use log_issue_monitor::monitor::MonitorController;

#[derive(Parser)]
#[command(
    name = "log-issue-monitor",
    about = "Watch an application log and report errors as GitHub issues",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail the log file and report errors until interrupted.
    Monitor {
        /// Log file to watch, overriding the configured one.
        #[arg(short, long)]
        log_file: Option<PathBuf>,
    },
    /// Check the connection to the issue tracker.
    Test,
    /// Print the effective configuration.
    CheckConfig,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(loader: &ConfigLoader) -> Option<MonitorConfig> {
    match loader.load_with_env() {
        Ok(config) => Some(config),
        Err(e) => {
            display::print_error(&e.to_string());
            None
        }
    }
}

async fn run_monitor(mut config: MonitorConfig, log_file: Option<PathBuf>) -> ExitCode {
    if let Some(path) = log_file {
        config.monitoring.log_file = path;
    }
    if !config.enabled {
        display::print_error("Monitoring is disabled in configuration");
        return ExitCode::FAILURE;
    }

    let repo = format!("{}/{}", config.tracker.owner, config.tracker.repository);
    let path = config.monitoring.log_file.clone();
    let mut monitor = match MonitorController::from_config(config) {
        Ok(monitor) => monitor,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = monitor.start().await {
        display::print_error(&e.to_string());
        return ExitCode::FAILURE;
    }
    display::print_monitor_started(&path, &repo);

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");

    let result = monitor.stop().await;
    display::print_status(&monitor.status());
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run_test(config: MonitorConfig) -> ExitCode {
    let repo = format!("{}/{}", config.tracker.owner, config.tracker.repository);
    let monitor = match MonitorController::from_config(config) {
        Ok(monitor) => monitor,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    match monitor.test_connection().await {
        Ok(true) => {
            display::print_connection_test(&repo, true);
            ExitCode::SUCCESS
        }
        Ok(false) => {
            display::print_connection_test(&repo, false);
            ExitCode::FAILURE
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run_check_config(config: &MonitorConfig, loader: &ConfigLoader) -> ExitCode {
    display::print_config_source(loader.find_config_file().as_deref());
    display::print_config(config);
    match config.validate() {
        Ok(()) => {
            display::print_success("Configuration is valid");
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let Some(config) = load_config(&loader) else {
        return ExitCode::FAILURE;
    };

    match cli.command {
        Commands::Monitor { log_file } => run_monitor(config, log_file).await,
        Commands::Test => run_test(config).await,
        Commands::CheckConfig => run_check_config(&config, &loader),
    }
}
