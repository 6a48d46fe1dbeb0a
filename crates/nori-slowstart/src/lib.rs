//! Per-key slow-start event buffering.
//!
//! Events for a key whose consumer is not ready yet are spooled to an
//! append-only file, replayed in publish order once the consumer becomes
//! ready, and then handed over to a direct pass-through path without loss,
//! duplication or reordering.
//!
//! - Checksummed length-prefixed records (XXH64)
//! - Lock-free publish path; one background drain task per key
//! - Keyed router with at-most-once queue creation and readiness observation
//! - Observability via nori-observe
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use nori_slowstart::{ready_signal, EventRouter, ReadyFuture, SlowStartConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (signal, ready) = ready_signal();
//!     let ready = parking_lot::Mutex::new(Some(ready));
//!     let observer = move |_key: &str| -> ReadyFuture {
//!         ready.lock().take().unwrap_or_else(nori_slowstart::ready_now)
//!     };
//!     let sink = |key: &str, payload: Bytes| println!("{key}: {payload:?}");
//!
//!     let router = EventRouter::new(
//!         SlowStartConfig::new("/var/lib/app/slowstart"),
//!         Arc::new(observer),
//!         Arc::new(sink),
//!         tokio::runtime::Handle::current(),
//!     )?;
//!
//!     // Buffered on disk until the consumer is ready.
//!     router.route("tenant-1", Bytes::from_static(b"hello"))?;
//!
//!     // Drains "hello" to the sink, then switches to pass-through.
//!     signal.complete();
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod executor;
pub mod queue;
pub mod record;
pub mod router;
pub mod sink;
pub mod state;
pub mod stats;

pub use config::{ConfigError, SlowStartConfig, DEFAULT_NAMESPACE};
pub use error::{RecordError, Result, SlowStartError};
pub use executor::{Executor, Task, ThreadExecutor};
pub use queue::EventQueue;
pub use router::EventRouter;
pub use sink::{
    ready_now, ready_signal, EventSink, ReadinessError, ReadinessObserver, ReadyFuture,
    ReadySignal,
};
pub use state::QueueState;
pub use stats::{QueueStats, StatsSnapshot};
