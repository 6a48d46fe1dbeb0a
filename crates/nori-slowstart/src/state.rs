//! Queue phase and its atomic holder.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Phase of a slow-start queue.
///
/// Phases only move forward in declaration order, with one shortcut from
/// `Initial` straight to `Steady` when readiness arrives before any event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum QueueState {
    /// Nothing published yet and not ready.
    Initial = 0,
    /// Events are being appended to the on-disk buffer.
    SlowStart = 1,
    /// Ready; the drain task is replaying the buffer while appends continue.
    Draining = 2,
    /// Drain caught up; the next publish retires the buffer.
    DrainDone = 3,
    /// Buffer retired; events pass straight to the sink.
    Steady = 4,
}

impl QueueState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => QueueState::Initial,
            1 => QueueState::SlowStart,
            2 => QueueState::Draining,
            3 => QueueState::DrainDone,
            _ => QueueState::Steady,
        }
    }

    /// True while publishes still go to the on-disk buffer.
    pub fn is_buffering(self) -> bool {
        self < QueueState::DrainDone
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueState::Initial => "initial",
            QueueState::SlowStart => "slow-start",
            QueueState::Draining => "draining",
            QueueState::DrainDone => "drain-done",
            QueueState::Steady => "steady",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`QueueState`]. Mutated only by compare-and-swap.
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(state: QueueState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> QueueState {
        QueueState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`. Returns false if another caller got there first.
    pub fn transition(&self, from: QueueState, to: QueueState) -> bool {
        debug_assert!(from < to, "queue state must move forward");
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
