//! Error types for slow-start queues and routing.

use crate::config::ConfigError;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while framing or unframing buffered records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Record header carries a zero length")]
    ZeroLength,
    #[error("Record length {len} exceeds limit of {max} bytes")]
    LengthOutOfRange { len: u32, max: u32 },
    #[error("Buffer ends with an incomplete record ({pending} bytes pending)")]
    Truncated { pending: usize },
}

#[derive(Debug, Error)]
pub enum SlowStartError {
    /// Rejected synchronously by `publish`; never retried.
    #[error("Payload is absent or empty")]
    EmptyPayload,

    #[error("Payload of {len} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { len: usize, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// The queue for `key` could not be created. Cached by the router and
    /// returned on every subsequent route for that key.
    #[error("Queue for key {key:?} is unavailable: {source}")]
    QueueUnavailable {
        key: String,
        #[source]
        source: Arc<SlowStartError>,
    },

    /// A state transition that only one party may perform was lost.
    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, SlowStartError>;
