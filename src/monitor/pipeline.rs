//! Parser → deduplicator → batcher, driven by one control flow.

use std::time::{Duration, Instant};

use crate::config::MonitorConfig;
use crate::parser::{ErrorRecord, LineParser};

use super::buffer::{Batch, Batcher};
use super::dedupe::Deduplicator;

/// How long an open entry waits for more continuation lines before it is
/// closed by a periodic tick.
pub const ENTRY_SETTLE: Duration = Duration::from_millis(200);

/// Counters kept by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records accepted by the parser.
    pub parsed: u64,
    /// Records dropped as repeats.
    pub suppressed: u64,
}

/// Processing state for one monitored file.
#[derive(Debug)]
pub struct Pipeline {
    parser: LineParser,
    dedupe: Deduplicator,
    batcher: Batcher,
    last_input: Option<Instant>,
    stats: PipelineStats,
}

impl Pipeline {
    #[must_use]
    pub fn new(parser: LineParser, dedupe: Deduplicator, batcher: Batcher) -> Self {
        Self {
            parser,
            dedupe,
            batcher,
            last_input: None,
            stats: PipelineStats::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &MonitorConfig, now: Instant) -> Self {
        Self::new(
            LineParser::from_config(&config.filters),
            Deduplicator::new(config.monitoring.dedupe_window()),
            Batcher::new(
                config.monitoring.buffer_size,
                config.monitoring.poll_interval(),
                now,
            ),
        )
    }

    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Records waiting to be reported, including an entry still collecting
    /// continuation lines.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.batcher.len() + usize::from(self.parser.has_pending())
    }

    /// Feed newly read lines. Returns batches that hit the size threshold.
    pub fn ingest<I, S>(&mut self, lines: I, now: Instant) -> Vec<Batch>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ready = Vec::new();
        let mut saw_input = false;
        for line in lines {
            saw_input = true;
            if let Some(record) = self.parser.feed(line.as_ref()) {
                ready.extend(self.admit(record, now));
            }
        }
        if saw_input {
            self.last_input = Some(now);
        }
        ready
    }

    /// Periodic check: closes a settled open entry and applies the time-based flush.
    pub fn tick(&mut self, now: Instant) -> Option<Batch> {
        let settled = self
            .last_input
            .is_none_or(|at| now.saturating_duration_since(at) >= ENTRY_SETTLE);
        if settled {
            if let Some(record) = self.parser.finish() {
                if let Some(batch) = self.admit(record, now) {
                    return Some(batch);
                }
            }
        }
        self.batcher.flush_due(now)
    }

    /// Close everything and return all buffered records.
    pub fn drain(&mut self, now: Instant) -> Batch {
        if let Some(record) = self.parser.finish() {
            if self.accept(&record, now) {
                let mut batch = self.batcher.flush(now);
                batch.push(record);
                return batch;
            }
        }
        self.batcher.flush(now)
    }

    fn admit(&mut self, record: ErrorRecord, now: Instant) -> Option<Batch> {
        if self.accept(&record, now) {
            self.batcher.add(record, now)
        } else {
            None
        }
    }

    fn accept(&mut self, record: &ErrorRecord, now: Instant) -> bool {
        self.stats.parsed += 1;
        if self.dedupe.should_report(record, now) {
            true
        } else {
            tracing::debug!(
                fingerprint = record.fingerprint(),
                message = record.message(),
                "Suppressed repeated error"
            );
            self.stats.suppressed += 1;
            false
        }
    }
}
