// SPDX-License-Identifier: GPL-3.0-only
// Sensor abstraction for the capture pipeline

//! Camera capture backends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← Acquire, convert, bridge, publish
//! └──────────┬──────────┘
//!            │ FrameQueue (depth + drop policy)
//!            ▲
//! ┌──────────┴──────────┐
//! │    Sensor Trait     │  ← Open / close, push frames into a FrameSink
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌─────────┐ ┌────────────┐
//! │GStreamer│ │Test pattern│
//! └─────────┘ └────────────┘
//! ```

pub mod acquisition;
pub mod format_converters;
pub mod frame_loop;
pub mod gst;
pub mod test_pattern;
pub mod types;

pub use acquisition::{FrameQueue, FrameSink, PushOutcome};
pub use format_converters::FormatConverter;
pub use frame_loop::{LoopAction, WorkerThread};
pub use gst::GstSensor;
pub use test_pattern::{PatternEmitter, TestPatternOptions, TestPatternSensor};
pub use types::*;

use crate::errors::CaptureError;

/// Image sensor collaborator
///
/// A sensor delivers planar frames by pushing them into the [`FrameSink`] it
/// was opened with, from whatever thread it produces them on. Each pushed
/// [`SensorFrame`] carries its own release guard, so the consumer only has to
/// drop the frame to hand the resource back.
pub trait Sensor: Send {
    // ===== Identification =====

    /// Human readable name used in logs
    fn name(&self) -> &str;

    // ===== Lifecycle =====

    /// Open the sensor stream and start delivering frames to `sink`
    ///
    /// # Returns
    /// * `Ok(())` - The stream is configured and running
    /// * `Err(CaptureError::PermissionDenied)` - Access to the device was refused
    /// * `Err(CaptureError::SensorOpen)` - The device could not be opened or configured
    fn open(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<(), CaptureError>;

    /// Stop delivering frames and close the device
    ///
    /// Best effort: failures are logged, never returned, and must not prevent
    /// a later `open()`.
    fn close(&mut self);

    /// Whether the stream is currently open
    fn is_open(&self) -> bool;
}

