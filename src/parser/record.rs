//! Structured error records and fingerprinting.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Severity;

/// Number of hex characters kept from the fingerprint digest.
const FINGERPRINT_LEN: usize = 16;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("valid uuid regex")
});
static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:0x)?[0-9a-f]*\d[0-9a-f]*\b").expect("valid hex regex"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid number regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid space regex"));

/// Request details carried in a log entry's JSON context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub url: Option<String>,
    pub method: Option<String>,
    pub ip: Option<String>,
    pub user_id: Option<String>,
    /// Any other context keys, kept verbatim.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RequestMetadata {
    /// Split a JSON context object into known request fields and the rest.
    #[must_use]
    pub fn from_map(mut map: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut take = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| map.remove(*key))
                .and_then(|v| match v {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                })
        };
        let url = take(&["url", "uri"]);
        let method = take(&["method"]);
        let ip = take(&["ip", "client_ip"]);
        let user_id = take(&["userId", "user_id"]);
        Self {
            url,
            method,
            ip,
            user_id,
            extra: map,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.method.is_none()
            && self.ip.is_none()
            && self.user_id.is_none()
            && self.extra.is_empty()
    }
}

/// Attachments captured after the primary log line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordContext {
    /// Stack trace and other continuation lines, in file order.
    pub stack_trace: Vec<String>,
    pub request: Option<RequestMetadata>,
}

impl RecordContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack_trace.is_empty() && self.request.as_ref().is_none_or(RequestMetadata::is_empty)
    }

    /// First `#0` frame of the stack trace, if any.
    #[must_use]
    pub fn first_frame(&self) -> Option<&str> {
        self.stack_trace
            .iter()
            .map(|l| l.trim_start())
            .find(|l| l.starts_with("#0"))
    }
}

/// One detected error occurrence. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    timestamp: DateTime<Utc>,
    level: Severity,
    channel: String,
    message: String,
    context: RecordContext,
    fingerprint: String,
}

impl ErrorRecord {
    /// Build a record, deriving its fingerprint.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        level: Severity,
        channel: impl Into<String>,
        message: impl Into<String>,
        context: RecordContext,
    ) -> Self {
        let message = message.into();
        let fingerprint = fingerprint(level, &message, context.first_frame());
        Self {
            timestamp,
            level,
            channel: channel.into(),
            message,
            context,
            fingerprint,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn level(&self) -> Severity {
        self.level
    }

    /// Logging channel (e.g. `local`, `production`).
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn context(&self) -> &RecordContext {
        &self.context
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Replace variable content (ids, numbers, hashes) so repeats compare equal.
#[must_use]
pub fn normalize_message(message: &str) -> String {
    let s = UUID_RE.replace_all(message, "<uuid>");
    let s = HEX_RE.replace_all(&s, |caps: &regex::Captures<'_>| {
        let m = &caps[0];
        if m.len() >= 8 && m.chars().any(|c| c.is_ascii_alphabetic()) {
            "<hex>".to_string()
        } else {
            m.to_string()
        }
    });
    let s = NUMBER_RE.replace_all(&s, "<n>");
    SPACE_RE.replace_all(s.trim(), " ").into_owned()
}

/// Stable digest of level, normalised message and optional first frame.
#[must_use]
pub fn fingerprint(level: Severity, message: &str, first_frame: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(level.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(normalize_message(message).as_bytes());
    if let Some(frame) = first_frame {
        hasher.update(b"|");
        hasher.update(normalize_message(frame).as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}
