// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic sensor producing moving colour bars
//!
//! Used when no camera is available (`--source test`) and as the sensor
//! harness in tests. The plane layout is configurable so the converter sees
//! the same shapes a real sensor produces: padded row strides, and chroma
//! either fully planar (pixel stride 1) or interleaved in one buffer with a
//! pixel stride of 2 or more.

use super::acquisition::{FrameSink, PushOutcome};
use super::frame_loop::{LoopAction, WorkerThread};
use super::types::{CaptureConfig, FrameData, PlanarFrame, Plane, SensorFrame};
use super::Sensor;
use crate::constants::timing;
use crate::errors::CaptureError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// SMPTE-style bars as (Y, U, V)
const BARS: [(u8, u8, u8); 8] = [
    (235, 128, 128), // white
    (210, 16, 146),  // yellow
    (170, 166, 16),  // cyan
    (145, 54, 34),   // green
    (106, 202, 222), // magenta
    (81, 90, 240),   // red
    (41, 240, 110),  // blue
    (16, 128, 128),  // black
];

/// Value written into row padding so leaks into the output are detectable
const PADDING_BYTE: u8 = 0xEE;

/// Layout and behaviour of the synthetic sensor
#[derive(Debug, Clone)]
pub struct TestPatternOptions {
    /// Extra bytes at the end of every row, on all planes
    pub row_padding: usize,
    /// Byte distance between chroma samples; 1 means fully planar chroma
    pub chroma_pixel_stride: usize,
    /// Interval between frames; `None` delivers frames only through [`PatternEmitter`]
    pub frame_interval: Option<Duration>,
    /// Refuse to open, as a device without camera permission would
    pub deny_permission: bool,
}

impl Default for TestPatternOptions {
    fn default() -> Self {
        Self {
            row_padding: 0,
            chroma_pixel_stride: 1,
            frame_interval: Some(Duration::from_millis(timing::TEST_PATTERN_INTERVAL_MS)),
            deny_permission: false,
        }
    }
}

impl TestPatternOptions {
    /// Options for a harness that drives every frame by hand
    pub fn manual() -> Self {
        Self {
            frame_interval: None,
            ..Default::default()
        }
    }
}

struct PatternShared {
    options: TestPatternOptions,
    sink: Mutex<Option<FrameSink>>,
    config: Mutex<Option<CaptureConfig>>,
    sequence: AtomicU64,
    emitted: AtomicU64,
    released: AtomicU64,
}

impl PatternShared {
    fn sink(&self) -> MutexGuard<'_, Option<FrameSink>> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn config(&self) -> MutexGuard<'_, Option<CaptureConfig>> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle that pushes one pattern frame per call into the sensor's sink
///
/// The sink from the most recent `open()` stays reachable after `close()`,
/// so a harness can keep producing callbacks once the session has stopped.
#[derive(Clone)]
pub struct PatternEmitter {
    shared: Arc<PatternShared>,
}

impl PatternEmitter {
    /// Build and push the next frame; `None` if the sensor was never opened
    pub fn emit(&self) -> Option<PushOutcome> {
        let config = self.shared.config().clone()?;
        let sink = self.shared.sink().clone()?;

        let sequence = self.shared.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = build_frame(
            config.width,
            config.height,
            sequence,
            &self.shared.options,
        );

        let shared = Arc::clone(&self.shared);
        let sensor_frame = SensorFrame::new(frame, move || {
            shared.released.fetch_add(1, Ordering::SeqCst);
        });

        self.shared.emitted.fetch_add(1, Ordering::SeqCst);
        Some(sink.push(sensor_frame))
    }

    /// Frames handed to the sink so far
    pub fn emitted(&self) -> u64 {
        self.shared.emitted.load(Ordering::SeqCst)
    }

    /// Frames whose resource has been released so far
    pub fn released(&self) -> u64 {
        self.shared.released.load(Ordering::SeqCst)
    }
}

/// Synthetic [`Sensor`] implementation
pub struct TestPatternSensor {
    shared: Arc<PatternShared>,
    producer: Option<WorkerThread>,
    open: bool,
}

impl TestPatternSensor {
    pub fn new(options: TestPatternOptions) -> Self {
        Self {
            shared: Arc::new(PatternShared {
                options,
                sink: Mutex::new(None),
                config: Mutex::new(None),
                sequence: AtomicU64::new(0),
                emitted: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
            producer: None,
            open: false,
        }
    }

    pub fn emitter(&self) -> PatternEmitter {
        PatternEmitter {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for TestPatternSensor {
    fn default() -> Self {
        Self::new(TestPatternOptions::default())
    }
}

impl Sensor for TestPatternSensor {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn open(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<(), CaptureError> {
        if self.shared.options.deny_permission {
            return Err(CaptureError::PermissionDenied(
                "test pattern sensor configured to deny access".to_string(),
            ));
        }
        if self.open {
            self.close();
        }

        *self.shared.config() = Some(config.clone());
        *self.shared.sink() = Some(sink);

        if let Some(interval) = self.shared.options.frame_interval {
            let emitter = self.emitter();
            let producer = WorkerThread::spawn("test-pattern", move || {
                emitter.emit();
                std::thread::sleep(interval);
                LoopAction::Continue
            })
            .map_err(|e| CaptureError::SensorOpen(format!("failed to spawn producer: {}", e)))?;
            self.producer = Some(producer);
        }

        self.open = true;
        info!(
            width = config.width,
            height = config.height,
            row_padding = self.shared.options.row_padding,
            pixel_stride = self.shared.options.chroma_pixel_stride,
            "Test pattern sensor opened"
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
        }
        if self.open {
            debug!("Test pattern sensor closed");
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for TestPatternSensor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build one pattern frame with the layout described by `options`
///
/// Bars scroll one step per sequence number. Padding bytes hold a marker
/// value that must never appear in converted output.
pub fn build_frame(
    width: u32,
    height: u32,
    sequence: u64,
    options: &TestPatternOptions,
) -> PlanarFrame {
    let w = width as usize;
    let h = height as usize;
    let cw = w / 2;
    let ch = h / 2;
    let shift = (sequence as usize) % w.max(1);
    let bar_at = |x: usize| BARS[((x + shift) % w.max(1)) * BARS.len() / w.max(1)];

    let y_stride = w + options.row_padding;
    let mut y_data = vec![PADDING_BYTE; y_stride * h];
    for row in 0..h {
        for x in 0..w {
            y_data[row * y_stride + x] = bar_at(x).0;
        }
    }
    let y = Plane::new(y_data, y_stride, 1);

    let pixel_stride = options.chroma_pixel_stride.max(1);
    let (chroma_a, chroma_b) = if pixel_stride == 1 {
        let stride = cw + options.row_padding;
        let mut u = vec![PADDING_BYTE; stride * ch];
        let mut v = vec![PADDING_BYTE; stride * ch];
        for row in 0..ch {
            for col in 0..cw {
                let (_, cu, cv) = bar_at(col * 2);
                u[row * stride + col] = cu;
                v[row * stride + col] = cv;
            }
        }
        (Plane::new(u, stride, 1), Plane::new(v, stride, 1))
    } else {
        // V and U share one buffer: V at k*stride, U one byte later
        let stride = cw * pixel_stride + options.row_padding;
        let mut shared = vec![PADDING_BYTE; stride * ch];
        for row in 0..ch {
            for col in 0..cw {
                let (_, cu, cv) = bar_at(col * 2);
                shared[row * stride + col * pixel_stride] = cv;
                shared[row * stride + col * pixel_stride + 1] = cu;
            }
        }
        // Each view ends at its last sample, so the final row is shorter than a stride
        let plane_len = if ch == 0 || cw == 0 {
            0
        } else {
            stride * (ch - 1) + (cw - 1) * pixel_stride + 1
        };
        let data = FrameData::from(shared);
        (
            Plane::view(data.clone(), 1, plane_len, stride, pixel_stride),
            Plane::view(data, 0, plane_len, stride, pixel_stride),
        )
    };

    PlanarFrame {
        width,
        height,
        y,
        chroma_a,
        chroma_b,
        sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::acquisition::FrameQueue;
    use crate::backends::camera::format_converters::FormatConverter;
    use crate::backends::camera::types::DropPolicy;

    fn small_config() -> CaptureConfig {
        CaptureConfig {
            width: 16,
            height: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_padding_never_reaches_output() {
        for pixel_stride in [1, 2, 3] {
            let options = TestPatternOptions {
                row_padding: 8,
                chroma_pixel_stride: pixel_stride,
                ..TestPatternOptions::manual()
            };
            let frame = build_frame(16, 8, 3, &options);
            let out = FormatConverter::default().convert(&frame);
            assert_eq!(out.data.len(), 16 * 8 + 2 * (16 * 8 / 4));
            assert!(
                !out.data.contains(&PADDING_BYTE),
                "padding leaked with pixel stride {}",
                pixel_stride
            );
        }
    }

    #[test]
    fn test_layouts_convert_identically() {
        let planar = build_frame(16, 8, 5, &TestPatternOptions::manual());
        let interleaved = build_frame(
            16,
            8,
            5,
            &TestPatternOptions {
                chroma_pixel_stride: 2,
                row_padding: 4,
                ..TestPatternOptions::manual()
            },
        );
        let converter = FormatConverter::default();
        assert_eq!(converter.convert(&planar), converter.convert(&interleaved));
    }

    #[test]
    fn test_denied_permission() {
        let mut sensor = TestPatternSensor::new(TestPatternOptions {
            deny_permission: true,
            ..TestPatternOptions::manual()
        });
        let queue = Arc::new(FrameQueue::new(2, DropPolicy::DropOldest));
        let result = sensor.open(&small_config(), FrameSink::new(queue));
        assert!(matches!(result, Err(CaptureError::PermissionDenied(_))));
        assert!(!sensor.is_open());
    }

    #[test]
    fn test_emitter_requires_open() {
        let sensor = TestPatternSensor::new(TestPatternOptions::manual());
        assert!(sensor.emitter().emit().is_none());
    }

    #[test]
    fn test_emitter_counts_releases() {
        let mut sensor = TestPatternSensor::new(TestPatternOptions::manual());
        let queue = Arc::new(FrameQueue::new(1, DropPolicy::DropOldest));
        sensor
            .open(&small_config(), FrameSink::new(Arc::clone(&queue)))
            .unwrap();

        let emitter = sensor.emitter();
        assert_eq!(emitter.emit(), Some(PushOutcome::Queued));
        assert_eq!(emitter.emit(), Some(PushOutcome::EvictedOldest));
        assert_eq!(emitter.released(), 1);

        queue.close();
        assert_eq!(emitter.released(), 2);
        assert_eq!(emitter.emit(), Some(PushOutcome::Closed));
        assert_eq!(emitter.emitted(), 3);
        assert_eq!(emitter.released(), 3);
    }

    #[test]
    fn test_producer_delivers_frames() {
        let mut sensor = TestPatternSensor::new(TestPatternOptions {
            frame_interval: Some(Duration::from_millis(1)),
            ..Default::default()
        });
        let queue = Arc::new(FrameQueue::new(2, DropPolicy::DropOldest));
        sensor
            .open(&small_config(), FrameSink::new(Arc::clone(&queue)))
            .unwrap();

        let frame = queue.acquire(Duration::from_secs(5));
        sensor.close();
        assert!(frame.is_some());
        assert!(!sensor.is_open());
    }
}
