//! Remote issue tracker interface.

mod error;
mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::TrackerError;
pub use github::GitHubClient;

/// Issue creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

/// Reference to an issue on the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    pub html_url: String,
}

/// Operations the monitor needs from an issue tracker.
///
/// Each call is a single attempt; implementations bound it with a timeout.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Open a new issue.
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRef, TrackerError>;

    /// Find an open issue whose body carries `fingerprint`.
    async fn find_open_issue(&self, fingerprint: &str) -> Result<Option<IssueRef>, TrackerError>;

    /// Comment on an existing issue.
    async fn add_comment(&self, issue: &IssueRef, body: &str) -> Result<(), TrackerError>;

    /// Cheap authenticated request; true when the tracker answers.
    async fn test_connection(&self) -> bool;
}
