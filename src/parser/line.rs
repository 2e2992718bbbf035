//! Log line classification and continuation grouping.
//!
//! Understands the Monolog/Laravel line layout:
//!
//! ```text
//! [2024-01-01 10:00:00] local.ERROR: Message text {"userId":1} []
//! [stacktrace]
//! #0 /app/Http/Controller.php(42): ...
//! ```

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use super::{ErrorRecord, RecordContext, RequestMetadata, Severity};
use crate::config::FilterConfig;

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(?P<ts>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\]\s+(?P<channel>[^\s.\]]+)\.(?P<level>[A-Za-z]+):\s?(?P<rest>.*)$",
    )
    .expect("valid entry regex")
});

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Offset without a colon (`+0200`), which RFC 3339 rejects.
const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Result of classifying a single line.
#[derive(Debug)]
enum LineKind {
    /// Entry line that passes the filters.
    Accepted(PendingEntry),
    /// Entry line below the minimum level, excluded, or with an unknown level.
    Rejected,
    /// Anything else; belongs to the previous entry.
    Continuation,
}

#[derive(Debug)]
struct PendingEntry {
    timestamp: DateTime<Utc>,
    level: Severity,
    channel: String,
    message: String,
    context: RecordContext,
}

impl PendingEntry {
    fn into_record(self) -> ErrorRecord {
        ErrorRecord::new(
            self.timestamp,
            self.level,
            self.channel,
            self.message,
            self.context,
        )
    }
}

/// Turns raw log lines into [`ErrorRecord`]s.
///
/// [`LineParser::parse`] looks at one line in isolation. [`LineParser::feed`]
/// keeps the most recent accepted entry open so that following continuation
/// lines (stack traces) are attached to it; the record is emitted once the
/// next entry line arrives or [`LineParser::finish`] is called.
#[derive(Debug)]
pub struct LineParser {
    min_level: Severity,
    exclude_patterns: Vec<String>,
    pending: Option<PendingEntry>,
    /// Set after a rejected entry so its continuation lines are dropped too.
    skipping: bool,
}

impl LineParser {
    #[must_use]
    pub fn new(min_level: Severity, exclude_patterns: Vec<String>) -> Self {
        Self {
            min_level,
            exclude_patterns: exclude_patterns
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect(),
            pending: None,
            skipping: false,
        }
    }

    #[must_use]
    pub fn from_config(filters: &FilterConfig) -> Self {
        Self::new(filters.min_level, filters.exclude_patterns.clone())
    }

    /// Whether `line` contains any exclusion pattern.
    #[must_use]
    pub fn is_excluded(&self, line: &str) -> bool {
        self.exclude_patterns.iter().any(|p| line.contains(p.as_str()))
    }

    /// Classify a single line without touching grouping state.
    ///
    /// Returns a record (without continuation context) when the line is an
    /// entry at or above the minimum level that matches no exclusion.
    #[must_use]
    pub fn parse(&self, line: &str) -> Option<ErrorRecord> {
        match self.classify(line) {
            LineKind::Accepted(entry) => Some(entry.into_record()),
            LineKind::Rejected | LineKind::Continuation => None,
        }
    }

    /// Feed the next line of the stream.
    ///
    /// Returns the previously open record when `line` starts a new entry.
    pub fn feed(&mut self, line: &str) -> Option<ErrorRecord> {
        let line = line.trim_end_matches(['\r', '\n']);
        match self.classify(line) {
            LineKind::Accepted(entry) => {
                self.skipping = false;
                self.pending.replace(entry).map(PendingEntry::into_record)
            }
            LineKind::Rejected => {
                self.skipping = true;
                self.finish()
            }
            LineKind::Continuation => {
                if self.skipping || line.trim().is_empty() || self.is_excluded(line) {
                    return None;
                }
                if let Some(entry) = self.pending.as_mut() {
                    entry.context.stack_trace.push(line.to_string());
                }
                None
            }
        }
    }

    /// Close the open entry, if any.
    pub fn finish(&mut self) -> Option<ErrorRecord> {
        self.pending.take().map(PendingEntry::into_record)
    }

    /// Whether an entry is still collecting continuation lines.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed all `lines` and close the last entry.
    pub fn parse_lines<I, S>(&mut self, lines: I) -> Vec<ErrorRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records: Vec<ErrorRecord> = lines
            .into_iter()
            .filter_map(|line| self.feed(line.as_ref()))
            .collect();
        records.extend(self.finish());
        records
    }

    fn classify(&self, line: &str) -> LineKind {
        let Some(caps) = ENTRY_RE.captures(line) else {
            return LineKind::Continuation;
        };
        let Some(timestamp) = parse_timestamp(&caps["ts"]) else {
            return LineKind::Continuation;
        };
        let Ok(level) = caps["level"].parse::<Severity>() else {
            return LineKind::Rejected;
        };
        if level < self.min_level || self.is_excluded(line) {
            return LineKind::Rejected;
        }

        let (message, context) = split_context(&caps["rest"]);
        LineKind::Accepted(PendingEntry {
            timestamp,
            level,
            channel: caps["channel"].to_string(),
            message,
            context,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let with_t = raw.replacen(' ', "T", 1);
    if let Ok(ts) = DateTime::parse_from_rfc3339(&with_t)
        .or_else(|_| DateTime::parse_from_str(&with_t, OFFSET_FORMAT))
    {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Separate the message from a trailing JSON context object.
fn split_context(rest: &str) -> (String, RecordContext) {
    let mut rest = rest.trim_end();
    while let Some(stripped) = rest.strip_suffix(" []") {
        rest = stripped.trim_end();
    }

    let mut context = RecordContext::default();
    let Some(idx) = rest.find(" {\"") else {
        return (rest.trim().to_string(), context);
    };

    let message = rest[..idx].trim().to_string();
    let json = rest[idx + 1..].trim();
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json) {
        Ok(mut map) => {
            if let Some(serde_json::Value::String(exception)) = map.remove("exception") {
                context
                    .stack_trace
                    .extend(exception.lines().map(str::to_string));
            }
            let request = RequestMetadata::from_map(map);
            if !request.is_empty() {
                context.request = Some(request);
            }
        }
        // Multi-line exception payload; the rest follows as continuation lines.
        Err(_) => context.stack_trace.push(json.to_string()),
    }
    (message, context)
}
