// SPDX-License-Identifier: GPL-3.0-only

//! External-facing lifecycle for the capture pipeline
//!
//! The controller is what an application holds: it starts the capture session
//! once the camera is available, stops it before the display goes away, and
//! hands the shared slot to whoever renders.

use super::capture_session::{CaptureSession, SessionState, SessionStats};
use crate::app::frame_slot::SharedFrameSlot;
use crate::app::render_loop::RedrawCallback;
use crate::backends::camera::types::CaptureConfig;
use crate::backends::camera::Sensor;
use crate::bridge::FrameBridge;
use crate::errors::CaptureResult;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Starts and stops a [`CaptureSession`] and owns its slot
pub struct PipelineController {
    session: Mutex<CaptureSession>,
    slot: Arc<SharedFrameSlot>,
}

impl PipelineController {
    pub fn new(sensor: Box<dyn Sensor>, bridge: Box<dyn FrameBridge>, config: CaptureConfig) -> Self {
        let slot = Arc::new(SharedFrameSlot::new());
        let session = CaptureSession::new(sensor, bridge, Arc::clone(&slot), config);
        Self {
            session: Mutex::new(session),
            slot,
        }
    }

    fn session(&self) -> MutexGuard<'_, CaptureSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start capturing
    ///
    /// Failure leaves the pipeline idle; calling again retries.
    pub fn start(&self) -> CaptureResult<()> {
        self.session().start()
    }

    /// Stop capturing; no frame is published after this returns
    pub fn stop(&self) {
        self.session().stop();
    }

    pub fn is_streaming(&self) -> bool {
        self.session().state() == SessionState::Streaming
    }

    pub fn state(&self) -> SessionState {
        self.session().state()
    }

    pub fn stats(&self) -> SessionStats {
        self.session().stats()
    }

    /// Slot the render side consumes from
    pub fn slot(&self) -> Arc<SharedFrameSlot> {
        Arc::clone(&self.slot)
    }

    pub fn set_redraw_requester(&self, redraw: Option<RedrawCallback>) {
        self.session().set_redraw_requester(redraw);
    }

    pub fn set_bridge(&self, bridge: Box<dyn FrameBridge>) {
        self.session().set_bridge(bridge);
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(|e| e.into_inner());
        if session.state() != SessionState::Idle {
            info!("Pipeline controller dropped while streaming, stopping");
            session.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::test_pattern::{TestPatternOptions, TestPatternSensor};
    use crate::bridge::EdgeBridge;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn config() -> CaptureConfig {
        CaptureConfig {
            width: 8,
            height: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_start_stop_cycle() {
        let controller = PipelineController::new(
            Box::new(TestPatternSensor::new(TestPatternOptions::manual())),
            Box::new(EdgeBridge::default()),
            config(),
        );
        assert!(!controller.is_streaming());
        controller.start().unwrap();
        assert!(controller.is_streaming());
        controller.stop();
        assert!(!controller.is_streaming());
        controller.start().unwrap();
        assert!(controller.is_streaming());
    }

    #[test]
    fn test_redraw_requested_after_publish() {
        let sensor = TestPatternSensor::new(TestPatternOptions::manual());
        let emitter = sensor.emitter();
        let controller =
            PipelineController::new(Box::new(sensor), Box::new(EdgeBridge::default()), config());

        let requests = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&requests);
        controller.set_redraw_requester(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        controller.start().unwrap();
        emitter.emit();
        for _ in 0..200 {
            if requests.load(Ordering::SeqCst) > 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        controller.stop();

        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(controller.slot().publish_count(), 1);
    }
}
