// SPDX-License-Identifier: GPL-3.0-only

//! Capture session: sensor stream to shared frame slot
//!
//! ```text
//! Idle ──start()──▶ Starting ──sensor open ok──▶ Streaming
//!   ▲                  │                            │
//!   └──── open failed ─┘          stop() ──▶ Stopping ──▶ Idle
//! ```
//!
//! Each start creates a fresh acquisition queue and a capture thread named
//! `capture-session`. That thread takes frames from the queue, converts them
//! to semi-planar, releases the sensor frame, hands the converted bytes to the
//! [`FrameBridge`] and publishes whatever it returns.

use crate::app::frame_slot::SharedFrameSlot;
use crate::app::render_loop::RedrawCallback;
use crate::backends::camera::acquisition::{FrameQueue, FrameSink};
use crate::backends::camera::format_converters::FormatConverter;
use crate::backends::camera::frame_loop::{LoopAction, WorkerThread};
use crate::backends::camera::types::CaptureConfig;
use crate::backends::camera::Sensor;
use crate::bridge::FrameBridge;
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a [`CaptureSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Streaming,
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Stopping => "stopping",
        };
        write!(f, "{}", name)
    }
}

/// Frame counters since the session was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames taken from the acquisition queue
    pub frames_received: u64,
    /// Frames released after conversion
    pub frames_released: u64,
    /// Bridge outputs published to the slot
    pub frames_published: u64,
    /// Frames for which the bridge produced nothing
    pub frames_declined: u64,
    /// Frames the queue discarded under its drop policy
    pub frames_dropped: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    released: AtomicU64,
    published: AtomicU64,
    declined: AtomicU64,
}

type SharedBridge = Arc<Mutex<Box<dyn FrameBridge>>>;
type SharedRedraw = Arc<Mutex<Option<RedrawCallback>>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owns a sensor stream and the capture thread servicing it
pub struct CaptureSession {
    sensor: Box<dyn Sensor>,
    bridge: SharedBridge,
    slot: Arc<SharedFrameSlot>,
    config: CaptureConfig,
    state: SessionState,
    queue: Option<Arc<FrameQueue>>,
    worker: Option<WorkerThread>,
    counters: Arc<Counters>,
    /// Drops counted by queues of earlier runs
    dropped_previous_runs: u64,
    redraw: SharedRedraw,
}

impl CaptureSession {
    pub fn new(
        sensor: Box<dyn Sensor>,
        bridge: Box<dyn FrameBridge>,
        slot: Arc<SharedFrameSlot>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            sensor,
            bridge: Arc::new(Mutex::new(bridge)),
            slot,
            config,
            state: SessionState::Idle,
            queue: None,
            worker: None,
            counters: Arc::new(Counters::default()),
            dropped_previous_runs: 0,
            redraw: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn slot(&self) -> &Arc<SharedFrameSlot> {
        &self.slot
    }

    pub fn sensor_name(&self) -> &str {
        self.sensor.name()
    }

    /// Callback invoked after every publish; takes effect immediately
    pub fn set_redraw_requester(&self, redraw: Option<RedrawCallback>) {
        *lock(&self.redraw) = redraw;
    }

    /// Swap the processing routine; the next frame uses the new one
    pub fn set_bridge(&self, bridge: Box<dyn FrameBridge>) {
        info!(bridge = bridge.name(), "Switching frame bridge");
        let previous = std::mem::replace(&mut *lock(&self.bridge), bridge);
        drop(previous);
    }

    pub fn stats(&self) -> SessionStats {
        let current_dropped = self.queue.as_ref().map(|q| q.dropped()).unwrap_or(0);
        SessionStats {
            frames_received: self.counters.received.load(Ordering::SeqCst),
            frames_released: self.counters.released.load(Ordering::SeqCst),
            frames_published: self.counters.published.load(Ordering::SeqCst),
            frames_declined: self.counters.declined.load(Ordering::SeqCst),
            frames_dropped: self.dropped_previous_runs + current_dropped,
        }
    }

    /// Open the sensor and begin streaming
    ///
    /// A failed open (including permission denial) is logged, leaves the
    /// session `Idle` and is returned so the caller can decide whether to
    /// retry.
    pub fn start(&mut self) -> CaptureResult<()> {
        if self.state != SessionState::Idle {
            return Err(CaptureError::AlreadyRunning);
        }
        if let Err(e) = self.config.validate() {
            warn!(error = %e, "Refusing to start capture with invalid configuration");
            return Err(e);
        }

        self.state = SessionState::Starting;
        info!(
            sensor = self.sensor.name(),
            width = self.config.width,
            height = self.config.height,
            queue_depth = self.config.queue_depth,
            policy = ?self.config.drop_policy,
            "Starting capture session"
        );

        let queue = Arc::new(FrameQueue::new(
            self.config.queue_depth,
            self.config.drop_policy,
        ));

        let worker = match self.spawn_capture_thread(Arc::clone(&queue)) {
            Ok(worker) => worker,
            Err(e) => {
                warn!(error = %e, "Failed to spawn capture thread");
                queue.close();
                self.state = SessionState::Idle;
                return Err(CaptureError::Pipeline(format!(
                    "failed to spawn capture thread: {}",
                    e
                )));
            }
        };
        self.queue = Some(Arc::clone(&queue));
        self.worker = Some(worker);

        if let Err(e) = self.sensor.open(&self.config, FrameSink::new(queue)) {
            match &e {
                CaptureError::PermissionDenied(reason) => {
                    warn!(reason = %reason, "Camera permission not granted, staying idle")
                }
                other => warn!(error = %other, "Failed to open sensor, staying idle"),
            }
            self.teardown();
            return Err(e);
        }

        self.state = SessionState::Streaming;
        info!(sensor = self.sensor.name(), "Capture session streaming");
        Ok(())
    }

    /// Stop streaming and join the capture thread
    ///
    /// Once this returns no further frame reaches the bridge or the slot.
    /// Calling it while idle does nothing.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        self.state = SessionState::Stopping;
        info!(sensor = self.sensor.name(), "Stopping capture session");
        self.teardown();

        let stats = self.stats();
        info!(
            received = stats.frames_received,
            published = stats.frames_published,
            declined = stats.frames_declined,
            dropped = stats.frames_dropped,
            "Capture session stopped"
        );
    }

    /// Close the sensor, then the queue, then join the capture thread
    fn teardown(&mut self) {
        self.sensor.close();

        if let Some(queue) = self.queue.take() {
            queue.close();
            self.dropped_previous_runs += queue.dropped();
        }
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }

        self.state = SessionState::Idle;
    }

    fn spawn_capture_thread(&self, queue: Arc<FrameQueue>) -> std::io::Result<WorkerThread> {
        let converter = FormatConverter::new(self.config.chroma_order);
        let bridge = Arc::clone(&self.bridge);
        let slot = Arc::clone(&self.slot);
        let counters = Arc::clone(&self.counters);
        let redraw = Arc::clone(&self.redraw);
        let poll = Duration::from_millis(timing::SENSOR_POLL_MS);
        let mut semi_planar = Vec::new();

        WorkerThread::spawn("capture-session", move || {
            let Some(frame) = queue.acquire(poll) else {
                return if queue.is_closed() {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                };
            };
            let received = counters.received.fetch_add(1, Ordering::SeqCst) + 1;

            let (width, height) = (frame.planar().width, frame.planar().height);
            converter.convert_into(frame.planar(), &mut semi_planar);
            frame.release();
            counters.released.fetch_add(1, Ordering::SeqCst);

            let output = lock(&bridge).process(&semi_planar, width, height);
            match output {
                Some(rgba) => {
                    slot.publish(rgba, width, height);
                    counters.published.fetch_add(1, Ordering::SeqCst);
                    let requester = lock(&redraw).clone();
                    if let Some(request_redraw) = requester {
                        request_redraw();
                    }
                }
                None => {
                    counters.declined.fetch_add(1, Ordering::SeqCst);
                    trace!(width, height, "Bridge produced no output, frame dropped");
                }
            }

            if received % timing::FRAME_LOG_INTERVAL == 0 {
                debug!(
                    received,
                    published = counters.published.load(Ordering::Relaxed),
                    declined = counters.declined.load(Ordering::Relaxed),
                    dropped = queue.dropped(),
                    width,
                    height,
                    "Capture statistics"
                );
            }

            LoopAction::Continue
        })
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::test_pattern::{TestPatternOptions, TestPatternSensor};
    use crate::bridge::ColorBridge;

    fn session(options: TestPatternOptions) -> (CaptureSession, Arc<SharedFrameSlot>) {
        let slot = Arc::new(SharedFrameSlot::new());
        let config = CaptureConfig {
            width: 16,
            height: 8,
            ..Default::default()
        };
        let session = CaptureSession::new(
            Box::new(TestPatternSensor::new(options)),
            Box::new(ColorBridge::default()),
            Arc::clone(&slot),
            config,
        );
        (session, slot)
    }

    #[test]
    fn test_state_transitions() {
        let (mut session, _slot) = session(TestPatternOptions::manual());
        assert_eq!(session.state(), SessionState::Idle);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        assert!(matches!(session.start(), Err(CaptureError::AlreadyRunning)));

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_invalid_config_stays_idle() {
        let slot = Arc::new(SharedFrameSlot::new());
        let mut session = CaptureSession::new(
            Box::new(TestPatternSensor::new(TestPatternOptions::manual())),
            Box::new(ColorBridge::default()),
            slot,
            CaptureConfig {
                width: 15,
                ..Default::default()
            },
        );
        assert!(matches!(
            session.start(),
            Err(CaptureError::InvalidConfig(_))
        ));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_streaming_publishes_frames() {
        let (mut session, slot) = session(TestPatternOptions::default());
        session.start().unwrap();

        let mut published = false;
        for _ in 0..200 {
            if slot.publish_count() > 0 {
                published = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        session.stop();

        assert!(published);
        let frame = slot.consume_latest().unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
        assert!(frame.is_consistent());
    }
}
