//! Per-queue counters.
//!
//! Counters are monotonic accumulators read only for reporting. They never
//! take part in control decisions, so plain relaxed atomics are enough.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sentinel stored in `drain_nanos` until a drain completes.
const NOT_DRAINED: u64 = u64::MAX;

#[derive(Debug)]
pub struct QueueStats {
    total: AtomicU64,
    pre_drained: AtomicU64,
    pre_ready: AtomicU64,
    drained: AtomicU64,
    corrupted: AtomicU64,
    drain_nanos: AtomicU64,
}

impl Default for QueueStats {
    fn default() -> Self {
        Self {
            total: AtomicU64::new(0),
            pre_drained: AtomicU64::new(0),
            pre_ready: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            corrupted: AtomicU64::new(0),
            drain_nanos: AtomicU64::new(NOT_DRAINED),
        }
    }
}

impl QueueStats {
    pub(crate) fn record_publish(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_buffered(&self) {
        self.pre_drained.fetch_add(1, Ordering::Relaxed);
    }

    /// Captures how many events were buffered strictly before readiness.
    pub(crate) fn snap_pre_ready(&self) -> u64 {
        let buffered = self.pre_drained.load(Ordering::Relaxed);
        self.pre_ready.store(buffered, Ordering::Relaxed);
        buffered
    }

    /// Counts a record read back by the drain task, intact or not.
    pub(crate) fn record_drained(&self, intact: bool) {
        self.drained.fetch_add(1, Ordering::Relaxed);
        if !intact {
            self.corrupted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_drain_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(NOT_DRAINED - 1);
        self.drain_nanos.store(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let drain_nanos = self.drain_nanos.load(Ordering::Relaxed);
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            pre_drained: self.pre_drained.load(Ordering::Relaxed),
            pre_ready: self.pre_ready.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
            time_to_drain: (drain_nanos != NOT_DRAINED).then(|| Duration::from_nanos(drain_nanos)),
        }
    }
}

/// Point-in-time copy of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Every accepted publish.
    pub total: u64,
    /// Publishes that went to the on-disk buffer.
    pub pre_drained: u64,
    /// Value of `pre_drained` at the moment readiness was declared.
    pub pre_ready: u64,
    /// Records read back by the drain task, including corrupted ones.
    pub drained: u64,
    /// Drained records dropped on checksum mismatch.
    pub corrupted: u64,
    /// Wall time from drain start until it caught up with the writer.
    pub time_to_drain: Option<Duration>,
}
