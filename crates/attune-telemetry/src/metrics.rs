use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for the session pipeline. Cheap to share, snapshot on
/// demand for logging or shutdown reports.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    sent: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects_exhausted: AtomicU64,
    dispatched: AtomicU64,
    subscriber_panics: AtomicU64,
    malformed_frames: AtomicU64,
    cache_writes: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sent: u64,
    pub queued: u64,
    pub dropped: u64,
    pub reconnect_attempts: u64,
    pub reconnects_exhausted: u64,
    pub dispatched: u64,
    pub subscriber_panics: u64,
    pub malformed_frames: u64,
    pub cache_writes: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_reconnects_exhausted(&self) {
        self.reconnects_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_subscriber_panics(&self) {
        self.subscriber_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_malformed_frames(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_cache_writes(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            reconnects_exhausted: self.reconnects_exhausted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            subscriber_panics: self.subscriber_panics.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
        }
    }
}
