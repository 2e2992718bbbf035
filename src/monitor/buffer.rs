//! Record buffering and flush policy.

use std::time::{Duration, Instant};

use crate::parser::ErrorRecord;

/// Records handed to the reporter in one flush.
pub type Batch = Vec<ErrorRecord>;

/// Not-yet-reported records plus the time of the last flush.
#[derive(Debug)]
pub struct PendingBatch {
    records: Batch,
    last_flush: Instant,
}

impl PendingBatch {
    #[must_use]
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    #[must_use]
    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }
}

/// Accumulates records and decides when to flush.
///
/// A flush happens when the batch reaches `max_size`, or on a periodic check
/// once `flush_interval` has elapsed since the previous flush and the batch
/// is non-empty.
#[derive(Debug)]
pub struct Batcher {
    pending: PendingBatch,
    max_size: usize,
    flush_interval: Duration,
}

impl Batcher {
    /// `max_size` is clamped to at least 1.
    #[must_use]
    pub fn new(max_size: usize, flush_interval: Duration, now: Instant) -> Self {
        Self {
            pending: PendingBatch {
                records: Vec::new(),
                last_flush: now,
            },
            max_size: max_size.max(1),
            flush_interval,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.records.is_empty()
    }

    #[must_use]
    pub fn pending(&self) -> &PendingBatch {
        &self.pending
    }

    /// Append a record; returns the flushed batch if the size threshold was reached.
    pub fn add(&mut self, record: ErrorRecord, now: Instant) -> Option<Batch> {
        self.pending.records.push(record);
        (self.pending.records.len() >= self.max_size).then(|| self.flush(now))
    }

    /// Periodic check; flushes a non-empty batch once the interval has elapsed.
    pub fn flush_due(&mut self, now: Instant) -> Option<Batch> {
        if self.is_empty() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.pending.last_flush);
        (elapsed >= self.flush_interval).then(|| self.flush(now))
    }

    /// Swap out the current batch for an empty one.
    pub fn flush(&mut self, now: Instant) -> Batch {
        self.pending.last_flush = now;
        std::mem::take(&mut self.pending.records)
    }
}
