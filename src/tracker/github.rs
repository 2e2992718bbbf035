//! GitHub REST API issue tracker.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

use crate::config::TrackerConfig;

use super::{IssueRef, IssueTracker, NewIssue, TrackerError};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<IssueRef>,
}

/// Client for the GitHub issues API of one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    owner: String,
    repository: String,
}

impl GitHubClient {
    /// Create a client.
    ///
    /// `timeout` bounds every request, so a hung call cannot stall shutdown.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::InvalidUrl` for an unusable base URL and
    /// `TrackerError::Client` if the HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        token: &str,
        owner: impl Into<String>,
        repository: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let api_url =
            Url::parse(api_url).map_err(|e| TrackerError::InvalidUrl(format!("{api_url}: {e}")))?;
        if api_url.cannot_be_a_base() {
            return Err(TrackerError::InvalidUrl(api_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TrackerError::Client(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("log-issue-monitor/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TrackerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            owner: owner.into(),
            repository: repository.into(),
        })
    }

    /// Create client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::MissingToken` if no token was resolved, or any
    /// error from [`GitHubClient::new`].
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        if config.token.trim().is_empty() {
            return Err(TrackerError::MissingToken(config.token_env.clone()));
        }
        Self::new(
            &config.api_url,
            &config.token,
            config.owner.clone(),
            config.repository.clone(),
            config.timeout(),
        )
    }

    /// `owner/repository`.
    #[must_use]
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TrackerError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| TrackerError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_endpoint(&self, segments: &[&str]) -> Result<Url, TrackerError> {
        let mut all = vec!["repos", self.owner.as_str(), self.repository.as_str()];
        all.extend_from_slice(segments);
        self.endpoint(&all)
    }
}

/// Turn a non-success response into `TrackerError::Http`.
async fn check_status(response: Response) -> Result<Response, TrackerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TrackerError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRef, TrackerError> {
        let url = self.repo_endpoint(&["issues"])?;
        let response = self.client.post(url).json(issue).send().await?;
        let created = check_status(response).await?.json::<IssueRef>().await?;
        Ok(created)
    }

    async fn find_open_issue(&self, fingerprint: &str) -> Result<Option<IssueRef>, TrackerError> {
        let mut url = self.endpoint(&["search", "issues"])?;
        let query = format!(
            "repo:{} is:issue is:open \"{fingerprint}\" in:body",
            self.repo_slug()
        );
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("per_page", "1");

        let response = self.client.get(url).send().await?;
        let found = check_status(response).await?.json::<SearchResponse>().await?;
        Ok(found.items.into_iter().next())
    }

    async fn add_comment(&self, issue: &IssueRef, body: &str) -> Result<(), TrackerError> {
        let number = issue.number.to_string();
        let url = self.repo_endpoint(&["issues", number.as_str(), "comments"])?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        let Ok(url) = self.endpoint(&["user"]) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Tracker connection test rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tracker connection test failed");
                false
            }
        }
    }
}
