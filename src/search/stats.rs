//! Per-session counters shared between workers and the aggregator.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of a session's task accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Candidates queued for comparison.
    pub dispatched: usize,
    /// Comparisons that produced a score.
    pub scored: usize,
    /// Scores delivered to the result channel.
    pub published: usize,
    /// Scores dropped because the scope had already concluded.
    pub discarded: usize,
    /// Comparisons whose scorer returned an error.
    pub failed: usize,
    /// Tasks that observed cancellation before producing a score.
    pub cancelled: usize,
    /// Results consumed by the aggregator.
    pub received: usize,
}

/// Lock-free counters behind [`SessionStats`].
#[derive(Debug, Default)]
pub struct SessionCounters {
    dispatched: AtomicUsize,
    scored: AtomicUsize,
    published: AtomicUsize,
    discarded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    received: AtomicUsize,
}

impl SessionCounters {
    pub(crate) fn record_dispatched(&self, count: usize) {
        self.dispatched.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_scored(&self) {
        self.scored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            scored: self.scored.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
        }
    }
}
