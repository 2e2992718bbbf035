//! Log Issue Monitor - Turn application log errors into tracker issues.

pub mod config;
pub mod display;
pub mod monitor;
pub mod parser;
pub mod tracker;
pub mod watcher;
