//! Per-key slow-start queue.
//!
//! Until its consumer is ready, a queue streams published events to a private
//! append-only buffer file. Once [`EventQueue::ready`] is called, a drain task
//! replays that file to the sink in publish order while new events keep being
//! appended behind it. When the drain catches up, the next publish retires the
//! buffer and every later event goes straight to the sink.
//!
//! ```text
//! Initial ──publish──▶ SlowStart ──ready──▶ Draining ──caught up──▶ DrainDone ──publish──▶ Steady
//!    └────────────────────────────ready (nothing buffered)───────────────────────────────────▲
//! ```
//!
//! Publishers and the drain never wait on each other's progress. The writer
//! handle sits behind a read/write lock: appends share it, and the drain takes
//! it exclusively only for its final catch-up read so that no append can land
//! behind a drain that has already declared itself done.

use crate::config::SlowStartConfig;
use crate::error::{RecordError, Result, SlowStartError};
use crate::executor::Executor;
use crate::record::{self, Frame, FrameReader};
use crate::sink::EventSink;
use crate::state::{AtomicState, QueueState};
use crate::stats::{QueueStats, StatsSnapshot};
use bytes::Bytes;
use nori_observe::{obs_count, obs_hist, Meter, NoopMeter, SlowStartEvt, SlowStartKind, VizEvent};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct EventQueue {
    key: String,
    buffer_path: PathBuf,
    max_payload_len: u32,
    read_buffer_size: usize,
    state: AtomicState,
    /// Append handle onto the buffer. `Some` from the first buffered publish
    /// until the buffer is retired.
    writer: RwLock<Option<File>>,
    sink: Arc<dyn EventSink>,
    executor: Arc<dyn Executor>,
    stats: QueueStats,
    meter: Arc<dyn Meter>,
}

impl EventQueue {
    /// Creates a queue for `key`, creating its buffer directory (and parents)
    /// if absent. The buffer file itself is only created by the first
    /// publish that arrives before readiness.
    pub fn open(
        key: impl Into<String>,
        config: &SlowStartConfig,
        sink: Arc<dyn EventSink>,
        executor: Arc<dyn Executor>,
    ) -> Result<Arc<Self>> {
        Self::open_with_meter(key, config, sink, executor, Arc::new(NoopMeter))
    }

    /// Creates a queue with a custom observability meter.
    pub fn open_with_meter(
        key: impl Into<String>,
        config: &SlowStartConfig,
        sink: Arc<dyn EventSink>,
        executor: Arc<dyn Executor>,
        meter: Arc<dyn Meter>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let key = key.into();
        std::fs::create_dir_all(config.key_dir(&key))?;
        let buffer_path = config.buffer_path(&key);

        tracing::debug!(key = %key, path = ?buffer_path, "slow-start queue created");

        Ok(Arc::new(Self {
            key,
            buffer_path,
            max_payload_len: config.max_payload_len,
            read_buffer_size: config.read_buffer_size,
            state: AtomicState::new(QueueState::Initial),
            writer: RwLock::new(None),
            sink,
            executor,
            stats: QueueStats::default(),
            meter,
        }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Location of this queue's buffer file. The file only exists while the
    /// queue is buffering or draining.
    pub fn buffer_path(&self) -> &Path {
        &self.buffer_path
    }

    pub fn state(&self) -> QueueState {
        self.state.load()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Publishes one event.
    ///
    /// Before the drain has caught up the event is appended to the buffer and
    /// this returns without touching the sink. Afterwards the event is handed
    /// to the sink on the calling thread.
    pub fn publish(&self, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(SlowStartError::EmptyPayload);
        }
        if payload.len() > self.max_payload_len as usize {
            return Err(SlowStartError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload_len,
            });
        }

        self.stats.record_publish();

        if self.state.load().is_buffering() {
            if self.state.load() == QueueState::Initial
                && self.state.transition(QueueState::Initial, QueueState::SlowStart)
            {
                self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
                    kind: SlowStartKind::BufferOpened,
                }));
            }

            if self.append(&payload)? {
                return Ok(());
            }
            // The drain finished between our check and the append.
        }

        // Acknowledges the drain catching up. Exactly one publish wins this.
        if self.state.transition(QueueState::DrainDone, QueueState::Steady) {
            self.retire_buffer();
        }

        self.sink.consume(&self.key, payload);
        Ok(())
    }

    /// Declares the consumer ready.
    ///
    /// Schedules the drain if anything was buffered; otherwise switches
    /// straight to pass-through. Later calls have no effect.
    ///
    /// If the drain task cannot be submitted the queue is left in `Draining`
    /// and keeps buffering, the same permanent fault as a failed drain.
    pub fn ready(self: &Arc<Self>) -> Result<()> {
        // Retry on a lost CAS: a first publish may move Initial -> SlowStart
        // between the two attempts.
        loop {
            match self.state.load() {
                QueueState::SlowStart => {
                    if self.state.transition(QueueState::SlowStart, QueueState::Draining) {
                        return self.start_drain();
                    }
                }
                QueueState::Initial => {
                    if self.state.transition(QueueState::Initial, QueueState::Steady) {
                        tracing::debug!(key = %self.key, "consumer ready before any event, passing through");
                        self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
                            kind: SlowStartKind::Steady,
                        }));
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn start_drain(self: &Arc<Self>) -> Result<()> {
        let buffered = self.stats.snap_pre_ready();
        tracing::info!(key = %self.key, buffered, "consumer ready, draining slow-start buffer");
        self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
            kind: SlowStartKind::DrainStarted { buffered },
        }));

        let queue = Arc::clone(self);
        if let Err(e) = self.executor.execute(Box::new(move || queue.drain())) {
            tracing::error!(
                key = %self.key,
                error = %e,
                "failed to submit slow-start drain, queue keeps buffering"
            );
            self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
                kind: SlowStartKind::DrainFailed,
            }));
            return Err(e.into());
        }
        Ok(())
    }

    /// Appends one record to the buffer.
    ///
    /// Returns `Ok(false)` without writing if the drain has already caught up,
    /// in which case the caller must pass the event through instead. The
    /// record is counted as buffered before the write, so a `ready` that
    /// overlaps an in-flight append includes it in `pre_ready`.
    fn append(&self, payload: &[u8]) -> Result<bool> {
        let encoded = record::encode(payload);

        {
            let writer = self.writer.read();
            if !self.state.load().is_buffering() {
                return Ok(false);
            }
            if let Some(mut file) = writer.as_ref() {
                self.stats.record_buffered();
                file.write_all(&encoded)?;
                return Ok(true);
            }
        }

        // First append: open the file under the exclusive side.
        let mut writer = self.writer.write();
        if !self.state.load().is_buffering() {
            return Ok(false);
        }
        self.ensure_writer(&mut writer)?;
        if let Some(file) = writer.as_mut() {
            self.stats.record_buffered();
            file.write_all(&encoded)?;
        }
        Ok(true)
    }

    fn ensure_writer(&self, writer: &mut Option<File>) -> io::Result<()> {
        if writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.buffer_path)?;
            *writer = Some(file);
        }
        Ok(())
    }

    /// Closes the writer and removes the buffer file.
    fn retire_buffer(&self) {
        drop(self.writer.write().take());

        match std::fs::remove_file(&self.buffer_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    key = %self.key,
                    path = ?self.buffer_path,
                    error = %e,
                    "failed to remove retired slow-start buffer"
                );
            }
        }

        tracing::debug!(key = %self.key, "slow-start buffer retired, passing through");
        self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
            kind: SlowStartKind::Steady,
        }));
    }

    /// Body of the drain task.
    fn drain(&self) {
        let started = Instant::now();

        match self.drain_buffer(started) {
            Ok(elapsed) => {
                let drained = self.stats.snapshot().drained;
                let ms = whole_millis(elapsed);
                tracing::info!(key = %self.key, drained, ms, "slow-start drain caught up");
                obs_hist!(self.meter, "slowstart_drain_ms", &[], elapsed.as_secs_f64() * 1000.0);
                self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
                    kind: SlowStartKind::DrainCompleted { drained, ms },
                }));
            }
            Err(e) => {
                // No retry: the queue stays in Draining and keeps buffering.
                tracing::error!(
                    key = %self.key,
                    path = ?self.buffer_path,
                    error = %e,
                    "slow-start drain failed"
                );
                self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
                    kind: SlowStartKind::DrainFailed,
                }));
            }
        }
    }

    /// Replays the buffer until caught up. Returns the time taken.
    fn drain_buffer(&self, started: Instant) -> Result<Duration> {
        // A publish may have won Initial -> SlowStart without having opened
        // the file yet; make sure there is something to read.
        let file = {
            let mut writer = self.writer.write();
            self.ensure_writer(&mut writer)?;
            File::open(&self.buffer_path)?
        };
        let mut reader = FrameReader::new(file, self.read_buffer_size, self.max_payload_len);

        loop {
            if let Some(frame) = reader.next_frame()? {
                self.deliver_drained(frame);
                continue;
            }

            // Looks caught up. Confirm with appends excluded.
            let writer = self.writer.write();
            match reader.next_frame()? {
                Some(frame) => {
                    drop(writer);
                    self.deliver_drained(frame);
                }
                None if reader.pending() > 0 => {
                    return Err(RecordError::Truncated {
                        pending: reader.pending(),
                    }
                    .into());
                }
                None => {
                    let elapsed = started.elapsed();
                    // Recorded first so it is visible once DrainDone is.
                    self.stats.record_drain_time(elapsed);
                    if !self.state.transition(QueueState::Draining, QueueState::DrainDone) {
                        return Err(SlowStartError::InvalidState(format!(
                            "drain finished while queue was {}",
                            self.state.load()
                        )));
                    }
                    drop(writer);
                    return Ok(elapsed);
                }
            }
        }
    }

    fn deliver_drained(&self, frame: Frame) {
        let intact = frame.is_intact();
        self.stats.record_drained(intact);

        if intact {
            self.sink.consume(&self.key, frame.payload);
        } else {
            tracing::error!(key = %self.key, len = frame.len(), "buffered record failed checksum, dropping");
            obs_count!(self.meter, "slowstart_corrupt_records_total", &[], 1);
            self.meter.emit(VizEvent::SlowStart(SlowStartEvt {
                kind: SlowStartKind::CorruptRecord { len: frame.len() },
            }));
        }
    }
}

/// Milliseconds in `elapsed`, saturating at `u32::MAX`.
fn whole_millis(elapsed: Duration) -> u32 {
    u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX)
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("key", &self.key)
            .field("state", &self.state.load())
            .field("buffer_path", &self.buffer_path)
            .finish()
    }
}
