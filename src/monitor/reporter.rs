//! Turns batches of error records into tracker issues.

use std::sync::Arc;

use crate::config::IssueConfig;
use crate::parser::{ErrorRecord, RequestMetadata};
use crate::tracker::{IssueTracker, NewIssue};

use super::buffer::Batch;

/// Outcome counts for one reported batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// New issues opened.
    pub created: usize,
    /// Occurrences added as comments to an existing open issue.
    pub commented: usize,
    /// Records dropped after a failed tracker call.
    pub failed: usize,
}

impl ReportSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.commented + self.failed
    }
}

/// Submits error records to an [`IssueTracker`].
///
/// Every record gets exactly one attempt. A failure is logged and the rest of
/// the batch carries on.
#[derive(Clone)]
pub struct IssueReporter {
    tracker: Arc<dyn IssueTracker>,
    config: IssueConfig,
}

impl std::fmt::Debug for IssueReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueReporter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IssueReporter {
    #[must_use]
    pub fn new(tracker: Arc<dyn IssueTracker>, config: IssueConfig) -> Self {
        Self { tracker, config }
    }

    /// Build the issue for a record.
    #[must_use]
    pub fn build_issue(&self, record: &ErrorRecord) -> NewIssue {
        NewIssue {
            title: self.title(record),
            body: self.body(record),
            labels: self.config.labels.clone(),
            assignees: self.config.assignees.clone(),
        }
    }

    /// Title: configured prefix plus the message cut to `title_max_len` characters.
    #[must_use]
    pub fn title(&self, record: &ErrorRecord) -> String {
        format!(
            "{}{}",
            self.config.title_prefix,
            truncate_chars(record.message(), self.config.title_max_len)
        )
    }

    /// Markdown body with optional stack trace and request sections.
    #[must_use]
    pub fn body(&self, record: &ErrorRecord) -> String {
        let mut body = format!(
            "## Error\n\n**Level:** {}  \n**Channel:** {}  \n**Time:** {}\n\n```\n{}\n```\n",
            record.level(),
            record.channel(),
            record.timestamp().format("%Y-%m-%d %H:%M:%S UTC"),
            record.message()
        );

        let context = record.context();
        if self.config.include_stack_trace && !context.stack_trace.is_empty() {
            body.push_str("\n## Stack Trace\n\n```\n");
            body.push_str(&context.stack_trace.join("\n"));
            body.push_str("\n```\n");
        }

        if self.config.include_request_info {
            if let Some(request) = context.request.as_ref().filter(|r| !r.is_empty()) {
                body.push_str("\n## Request\n\n");
                body.push_str(&request_lines(request));
            }
        }

        body.push_str(&format!(
            "\n---\n*Reported automatically by log-issue-monitor.*\n<!-- fingerprint: {} -->\n",
            record.fingerprint()
        ));
        body
    }

    /// Report every record of `batch`, isolating failures per record.
    pub async fn report(&self, batch: Batch) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for record in &batch {
            let issue = self.build_issue(record);

            if self.config.reuse_open_issues && self.comment_on_existing(record, &issue).await {
                summary.commented += 1;
                continue;
            }

            match self.tracker.create_issue(&issue).await {
                Ok(created) => {
                    tracing::info!(
                        title = %issue.title,
                        number = created.number,
                        url = %created.html_url,
                        "Created issue"
                    );
                    summary.created += 1;
                }
                Err(e) => {
                    tracing::error!(title = %issue.title, error = %e, "Failed to create issue");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Comment on an open issue with the same fingerprint. Returns false when
    /// a new issue should be created instead.
    async fn comment_on_existing(&self, record: &ErrorRecord, issue: &NewIssue) -> bool {
        let existing = match self.tracker.find_open_issue(record.fingerprint()).await {
            Ok(Some(existing)) => existing,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(title = %issue.title, error = %e, "Issue search failed, creating new issue");
                return false;
            }
        };

        let comment = format!(
            "Occurred again at {}.\n\n```\n{}\n```",
            record.timestamp().format("%Y-%m-%d %H:%M:%S UTC"),
            record.message()
        );
        match self.tracker.add_comment(&existing, &comment).await {
            Ok(()) => {
                tracing::info!(title = %issue.title, number = existing.number, "Commented on existing issue");
            }
            Err(e) => {
                tracing::error!(
                    title = %issue.title,
                    number = existing.number,
                    error = %e,
                    "Failed to comment on existing issue"
                );
            }
        }
        // The existing issue covers this record either way; no second attempt.
        true
    }
}

fn request_lines(request: &RequestMetadata) -> String {
    let fields = [
        ("URL", &request.url),
        ("Method", &request.method),
        ("IP", &request.ip),
        ("User", &request.user_id),
    ];
    let known = fields
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("- **{label}:** {v}\n")));
    let extra = request.extra.iter().map(|(key, value)| match value {
        serde_json::Value::String(s) => format!("- **{key}:** {s}\n"),
        other => format!("- **{key}:** `{other}`\n"),
    });
    known.chain(extra).collect()
}

/// Cut `s` to at most `max` characters, ending in `...` when shortened.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max - 3).collect();
    format!("{}...", kept.trim_end())
}
