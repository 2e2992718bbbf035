//! Monitoring pipeline and lifecycle.
//!
//! Lines flow from the tailer through the parser, deduplicator and batcher
//! before the reporter turns each record into a tracker issue.

mod buffer;
mod controller;
mod dedupe;
mod error;
mod pipeline;
mod reporter;

pub use buffer::{Batch, Batcher, PendingBatch};
pub use controller::{MonitorController, MonitorState, MonitorStatus};
pub use dedupe::Deduplicator;
pub use error::MonitorError;
pub use pipeline::{Pipeline, PipelineStats, ENTRY_SETTLE};
pub use reporter::{IssueReporter, ReportSummary};
