//! Per-sink delivery counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Delivery counters for one sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    delivered: AtomicU64,
    failed: AtomicU64,
    /// Rejected on a full queue
    dropped: AtomicU64,
    /// Sequence number of the last delivered bulletin, 0 before the first
    last_seq: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn record_delivered(&self, seq: u64) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.last_seq.fetch_max(seq, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SinkStats {
        SinkStats {
            queue_len: self.queue_len(),
            delivered: self.delivered(),
            failed: self.failed(),
            dropped: self.dropped(),
            last_seq: self.last_seq(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub queue_len: usize,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
    pub last_seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_seq_is_monotonic() {
        let metrics = SinkMetrics::new();
        metrics.record_delivered(4);
        metrics.record_delivered(2);
        metrics.record_dropped();

        let stats = metrics.snapshot();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.last_seq, 4);
        assert_eq!(stats.dropped, 1);
    }
}
