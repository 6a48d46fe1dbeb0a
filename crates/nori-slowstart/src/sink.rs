//! Collaborator contracts: where events go, and when a key becomes ready.

use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::oneshot;

/// Receives events once their key's consumer is ready.
///
/// Called from the drain task or from a publisher's thread during
/// pass-through. Calls for different keys may run concurrently; calls for the
/// same key are never issued in a way that could reorder them.
pub trait EventSink: Send + Sync + 'static {
    fn consume(&self, key: &str, payload: Bytes);
}

impl<F> EventSink for F
where
    F: Fn(&str, Bytes) + Send + Sync + 'static,
{
    fn consume(&self, key: &str, payload: Bytes) {
        self(key, payload)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadinessError {
    /// The signalling side was dropped without declaring readiness.
    #[error("Readiness signal dropped before completion")]
    Abandoned,
    #[error("Readiness failed: {0}")]
    Failed(String),
}

/// Completes when the consumer for a key can accept events.
pub type ReadyFuture = BoxFuture<'static, Result<(), ReadinessError>>;

/// Told about every key the router sees for the first time.
pub trait ReadinessObserver: Send + Sync + 'static {
    /// Called exactly once per key. The returned future may complete at any
    /// time, on any task; a pre-completed future means "ready now".
    fn observe_new_key(&self, key: &str) -> ReadyFuture;
}

impl<F> ReadinessObserver for F
where
    F: Fn(&str) -> ReadyFuture + Send + Sync + 'static,
{
    fn observe_new_key(&self, key: &str) -> ReadyFuture {
        self(key)
    }
}

/// Sending half of a one-shot readiness notification.
#[derive(Debug)]
pub struct ReadySignal {
    tx: oneshot::Sender<Result<(), ReadinessError>>,
}

impl ReadySignal {
    /// Declares the key ready.
    pub fn complete(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Declares that the key will never become ready.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(ReadinessError::Failed(reason.into())));
    }
}

/// Creates a readiness signal and the future it completes.
pub fn ready_signal() -> (ReadySignal, ReadyFuture) {
    let (tx, rx) = oneshot::channel();
    let fut = rx
        .map(|res| res.unwrap_or(Err(ReadinessError::Abandoned)))
        .boxed();
    (ReadySignal { tx }, fut)
}

/// A pre-completed readiness future.
pub fn ready_now() -> ReadyFuture {
    future::ready(Ok(())).boxed()
}
