//! Tracker error types.

use thiserror::Error;

/// Errors from issue tracker operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Access token not configured (env: {0})")]
    MissingToken(String),
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Issue tracker request timed out")]
    Timeout,
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl From<reqwest::Error> for TrackerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::ParseError(e.to_string())
        } else {
            Self::RequestFailed(e.to_string())
        }
    }
}
