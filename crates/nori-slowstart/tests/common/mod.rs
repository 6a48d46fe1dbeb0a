//! Shared helpers for the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use nori_observe::{Counter, Gauge, Histogram, Meter, VizEvent};
use nori_slowstart::{EventQueue, EventSink, QueueState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(20);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Big-endian u32 payload, so delivery order can be checked numerically.
pub fn payload(v: u32) -> Bytes {
    Bytes::copy_from_slice(&v.to_be_bytes())
}

pub fn value(payload: &Bytes) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(payload);
    u32::from_be_bytes(raw)
}

/// Sink that records every delivery in arrival order.
#[derive(Default)]
pub struct CollectingSink {
    seen: Mutex<Vec<(String, Bytes)>>,
}

impl EventSink for CollectingSink {
    fn consume(&self, key: &str, payload: Bytes) {
        self.seen.lock().push((key.to_string(), payload));
    }
}

impl CollectingSink {
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Values delivered for `key`, in delivery order.
    pub fn values(&self, key: &str) -> Vec<u32> {
        self.seen
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, p)| value(p))
            .collect()
    }

    pub fn payloads(&self, key: &str) -> Vec<Bytes> {
        self.seen
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Blocks until at least `n` events have been delivered in total.
    pub fn wait_for(&self, n: usize) {
        let deadline = Instant::now() + WAIT;
        while self.len() < n {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {} events, have {}",
                n,
                self.len()
            );
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    pub async fn wait_for_async(&self, n: usize) {
        let deadline = Instant::now() + WAIT;
        while self.len() < n {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {} events, have {}",
                n,
                self.len()
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

/// Blocks until the queue's drain has caught up with its writer.
pub fn wait_caught_up(queue: &EventQueue) {
    let deadline = Instant::now() + WAIT;
    while queue.state() < QueueState::DrainDone {
        assert!(Instant::now() < deadline, "drain never caught up");
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Meter that keeps counter totals and every emitted event.
#[derive(Default)]
pub struct RecordingMeter {
    counters: Arc<Mutex<HashMap<&'static str, u64>>>,
    gauges: Arc<Mutex<HashMap<&'static str, i64>>>,
    events: Mutex<Vec<VizEvent>>,
}

struct RecordingCounter {
    name: &'static str,
    counters: Arc<Mutex<HashMap<&'static str, u64>>>,
}

impl Counter for RecordingCounter {
    fn inc(&self, v: u64) {
        *self.counters.lock().entry(self.name).or_default() += v;
    }
}

struct RecordingGauge {
    name: &'static str,
    gauges: Arc<Mutex<HashMap<&'static str, i64>>>,
}

impl Gauge for RecordingGauge {
    fn set(&self, v: i64) {
        self.gauges.lock().insert(self.name, v);
    }
}

struct IgnoredHistogram;

impl Histogram for IgnoredHistogram {
    fn observe(&self, _v: f64) {}
}

impl Meter for RecordingMeter {
    fn counter(
        &self,
        name: &'static str,
        _labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Counter> {
        Box::new(RecordingCounter {
            name,
            counters: self.counters.clone(),
        })
    }

    fn gauge(
        &self,
        name: &'static str,
        _labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Gauge> {
        Box::new(RecordingGauge {
            name,
            gauges: self.gauges.clone(),
        })
    }

    fn histo(
        &self,
        _name: &'static str,
        _buckets: &'static [f64],
        _labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Histogram> {
        Box::new(IgnoredHistogram)
    }

    fn emit(&self, evt: VizEvent) {
        self.events.lock().push(evt);
    }
}

impl RecordingMeter {
    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn gauge_value(&self, name: &str) -> Option<i64> {
        self.gauges.lock().get(name).copied()
    }

    pub fn events(&self) -> Vec<VizEvent> {
        self.events.lock().clone()
    }

    /// Blocks until an emitted event satisfies `pred`.
    pub fn wait_for_event(&self, pred: impl Fn(&VizEvent) -> bool) {
        let deadline = Instant::now() + WAIT;
        while !self.events.lock().iter().any(&pred) {
            assert!(Instant::now() < deadline, "expected event never emitted");
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}
