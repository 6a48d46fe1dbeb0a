//! Keyed router: one slow-start queue per key.
//!
//! The first `route` for a key creates its queue and asks the readiness
//! observer when that key's consumer will be ready. Completion of the returned
//! future is forwarded to [`EventQueue::ready`] on the router's runtime.
//!
//! A key whose queue could not be created stays mapped to the failure, so every
//! later route for it fails immediately with the original cause instead of
//! retrying the I/O.

use crate::config::SlowStartConfig;
use crate::error::{Result, SlowStartError};
use crate::executor::Executor;
use crate::queue::EventQueue;
use crate::sink::{EventSink, ReadinessObserver};
use crate::stats::StatsSnapshot;
use bytes::Bytes;
use nori_observe::{obs_count, obs_gauge, Meter, NoopMeter, RouterEvt, RouterKind, VizEvent};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;

type Route = std::result::Result<Arc<EventQueue>, Arc<SlowStartError>>;

/// Per-key slot. Inserted under the map lock, initialized outside it.
type Slot = Arc<OnceCell<Route>>;

pub struct EventRouter {
    config: SlowStartConfig,
    routes: RwLock<HashMap<String, Slot>>,
    observer: Arc<dyn ReadinessObserver>,
    sink: Arc<dyn EventSink>,
    runtime: Handle,
    executor: Arc<dyn Executor>,
    meter: Arc<dyn Meter>,
}

impl EventRouter {
    /// Creates a router. Readiness futures are awaited and drains are run on
    /// `runtime`.
    pub fn new(
        config: SlowStartConfig,
        observer: Arc<dyn ReadinessObserver>,
        sink: Arc<dyn EventSink>,
        runtime: Handle,
    ) -> Result<Self> {
        Self::with_meter(config, observer, sink, runtime, Arc::new(NoopMeter))
    }

    /// Creates a router with a custom observability meter.
    pub fn with_meter(
        config: SlowStartConfig,
        observer: Arc<dyn ReadinessObserver>,
        sink: Arc<dyn EventSink>,
        runtime: Handle,
        meter: Arc<dyn Meter>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            routes: RwLock::new(HashMap::new()),
            observer,
            sink,
            executor: Arc::new(runtime.clone()),
            runtime,
            meter,
        })
    }

    /// Publishes `payload` to the queue for `key`, creating the queue on first
    /// sight.
    ///
    /// Fails with [`SlowStartError::QueueUnavailable`] on every call for a key
    /// whose queue could not be created.
    pub fn route(&self, key: &str, payload: impl Into<Bytes>) -> Result<()> {
        match self.resolve(key) {
            Ok(queue) => queue.publish(payload),
            Err(cause) => Err(SlowStartError::QueueUnavailable {
                key: key.to_string(),
                source: cause,
            }),
        }
    }

    /// Counters of the queue for `key`, if it exists.
    pub fn stats(&self, key: &str) -> Option<StatsSnapshot> {
        match self.routes.read().get(key).and_then(|slot| slot.get()) {
            Some(Ok(queue)) => Some(queue.stats()),
            _ => None,
        }
    }

    /// Every key seen so far, including keys whose queue failed.
    pub fn keys(&self) -> Vec<String> {
        self.routes.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    fn resolve(&self, key: &str) -> Route {
        // Fast path: key already seen
        let slot = self.routes.read().get(key).cloned();
        let slot = match slot {
            Some(slot) => slot,
            None => {
                let mut routes = self.routes.write();
                let slot = routes.entry(key.to_string()).or_default().clone();
                obs_gauge!(self.meter, "slowstart_active_queues", &[], routes.len());
                slot
            }
        };

        if let Some(route) = slot.get() {
            return route.clone();
        }

        // Queue creation touches the filesystem, so it runs without the map
        // lock. Concurrent callers for the same key wait on the slot.
        let mut created = false;
        let route = slot
            .get_or_init(|| {
                created = true;
                self.create(key)
            })
            .clone();

        // Only the initializing caller watches, so the observer runs once per key.
        if created {
            if let Ok(queue) = &route {
                self.watch(queue);
            }
        }
        route
    }

    fn create(&self, key: &str) -> Route {
        match EventQueue::open_with_meter(
            key,
            &self.config,
            self.sink.clone(),
            self.executor.clone(),
            self.meter.clone(),
        ) {
            Ok(queue) => {
                obs_count!(self.meter, "slowstart_queues_created_total", &[], 1);
                self.meter.emit(VizEvent::Router(RouterEvt {
                    kind: RouterKind::QueueCreated,
                }));
                Ok(queue)
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to create slow-start queue");
                obs_count!(self.meter, "slowstart_queue_create_failures_total", &[], 1);
                self.meter.emit(VizEvent::Router(RouterEvt {
                    kind: RouterKind::QueueFailed,
                }));
                Err(Arc::new(e))
            }
        }
    }

    fn watch(&self, queue: &Arc<EventQueue>) {
        let ready = self.observer.observe_new_key(queue.key());
        let queue = Arc::clone(queue);
        let meter = self.meter.clone();

        self.runtime.spawn(async move {
            match ready.await {
                Ok(()) => {
                    // A failure to schedule the drain is logged by the queue.
                    let _ = queue.ready();
                }
                Err(e) => {
                    tracing::warn!(
                        key = %queue.key(),
                        error = %e,
                        "readiness never arrived, key keeps buffering"
                    );
                    meter.emit(VizEvent::Router(RouterEvt {
                        kind: RouterKind::ReadinessAbandoned,
                    }));
                }
            }
        });
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("storage_root", &self.config.storage_root)
            .field("keys", &self.len())
            .finish()
    }
}
