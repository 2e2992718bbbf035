//! Time-windowed duplicate suppression.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::parser::ErrorRecord;

/// Map size at which the first full sweep of expired entries happens.
const MIN_SWEEP_LEN: usize = 64;

/// Decides whether an error occurrence is new or a repeat.
///
/// Keeps fingerprint → last reported instant. An entry expires once a full
/// window has elapsed; expired entries are dropped lazily on lookup and by
/// occasional sweeps when the map grows. State lives only in memory.
#[derive(Debug)]
pub struct Deduplicator {
    window: Duration,
    seen: HashMap<String, Instant>,
    sweep_at: usize,
}

impl Deduplicator {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
            sweep_at: MIN_SWEEP_LEN,
        }
    }

    /// Number of tracked fingerprints, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// True the first time a fingerprint is seen in a window, false for repeats.
    pub fn should_report(&mut self, record: &ErrorRecord, now: Instant) -> bool {
        self.should_report_fingerprint(record.fingerprint(), now)
    }

    /// Fingerprint form of [`Deduplicator::should_report`].
    pub fn should_report_fingerprint(&mut self, fingerprint: &str, now: Instant) -> bool {
        if let Some(last) = self.seen.get_mut(fingerprint) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
            *last = now;
            return true;
        }

        if self.seen.len() >= self.sweep_at {
            self.purge_expired(now);
            self.sweep_at = (self.seen.len() * 2).max(MIN_SWEEP_LEN);
        }
        self.seen.insert(fingerprint.to_string(), now);
        true
    }

    /// Drop every entry whose window has elapsed.
    pub fn purge_expired(&mut self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_, last| now.saturating_duration_since(*last) < window);
    }
}
