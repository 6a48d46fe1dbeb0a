//! nori-observe: vendor-neutral observability ABI.
//!
//! Core crates depend only on these traits and event types. Backends live elsewhere.

pub trait Counter: Send + Sync {
    fn inc(&self, v: u64);
}
pub trait Gauge: Send + Sync {
    fn set(&self, v: i64);
}
pub trait Histogram: Send + Sync {
    fn observe(&self, v: f64);
}

pub trait Meter: Send + Sync + 'static {
    fn counter(
        &self,
        name: &'static str,
        labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Counter>;
    fn gauge(
        &self,
        name: &'static str,
        labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Gauge>;
    fn histo(
        &self,
        name: &'static str,
        _buckets: &'static [f64],
        labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Histogram>;
    fn emit(&self, evt: VizEvent);
}

/// A do-nothing meter for tests and users who don't care about telemetry.
#[derive(Clone, Default)]
pub struct NoopMeter;
struct NoopC;
impl Counter for NoopC {
    fn inc(&self, _v: u64) {}
}
struct NoopG;
impl Gauge for NoopG {
    fn set(&self, _v: i64) {}
}
struct NoopH;
impl Histogram for NoopH {
    fn observe(&self, _v: f64) {}
}
impl Meter for NoopMeter {
    fn counter(
        &self,
        _n: &'static str,
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Counter> {
        Box::new(NoopC)
    }
    fn gauge(
        &self,
        _n: &'static str,
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Gauge> {
        Box::new(NoopG)
    }
    fn histo(
        &self,
        _n: &'static str,
        _b: &'static [f64],
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Histogram> {
        Box::new(NoopH)
    }
    fn emit(&self, _e: VizEvent) {}
}

/// Typed events for live visualization (keys/payloads never included).
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum VizEvent {
    SlowStart(SlowStartEvt),
    Router(RouterEvt),
}

/// Phase changes of a single slow-start queue.
#[derive(Clone, Debug)]
pub struct SlowStartEvt {
    pub kind: SlowStartKind,
}
#[derive(Clone, Debug, PartialEq)]
pub enum SlowStartKind {
    /// First event arrived before readiness; the on-disk buffer was opened.
    BufferOpened,
    /// Readiness declared with `buffered` events waiting on disk.
    DrainStarted { buffered: u64 },
    /// A buffered record failed its checksum and was dropped.
    CorruptRecord { len: u32 },
    /// Drain caught up with the writer.
    DrainCompleted { drained: u64, ms: u32 },
    /// Drain aborted on an I/O or framing error; the queue keeps buffering.
    DrainFailed,
    /// Buffer retired, events now pass straight through.
    Steady,
}

#[derive(Clone, Debug)]
pub struct RouterEvt {
    pub kind: RouterKind,
}
#[derive(Clone, Debug, PartialEq)]
pub enum RouterKind {
    QueueCreated,
    QueueFailed,
    /// The readiness future for a key resolved with an error.
    ReadinessAbandoned,
}

/// Macros (simple versions). Can be feature-gated if desired.
#[macro_export]
macro_rules! obs_count {
    ($m:expr, $name:expr, $labels:expr, $v:expr) => {{
        $m.counter($name, $labels).inc($v as u64);
    }};
}
#[macro_export]
macro_rules! obs_gauge {
    ($m:expr, $name:expr, $labels:expr, $v:expr) => {{
        $m.gauge($name, $labels).set($v as i64);
    }};
}
#[macro_export]
macro_rules! obs_hist {
    ($m:expr, $name:expr, $labels:expr, $v:expr) => {{
        $m.histo($name, &[], $labels).observe($v as f64);
    }};
}
