// SPDX-License-Identifier: GPL-3.0-only

//! Camera frame pipeline
//!
//! Captures planar YUV frames from a sensor, converts them to a semi-planar
//! layout, runs a processing routine over each frame and draws the result
//! with wgpu.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Sensors, frame types and format conversion
//! - [`bridge`]: Per-frame processing routines
//! - [`pipelines`]: Capture session and its controller
//! - [`app`]: Frame slot, presenter and render thread
//! - [`gpu`]: wgpu device creation
//! - [`config`]: User configuration handling
//! - [`storage`]: Snapshot file naming and locations
//!
//! # Example
//!
//! ```ignore
//! let controller = PipelineController::new(
//!     Box::new(TestPatternSensor::default()),
//!     BridgeKind::Edge.build(ChromaOrder::Nv21),
//!     CaptureConfig::default(),
//! );
//! let render = spawn_render_loop(make_backend, controller.slot(), RenderOptions::default())?;
//! controller.set_redraw_requester(Some(render.redraw_callback()));
//! controller.start()?;
//! ```

pub mod app;
pub mod backends;
pub mod bridge;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod pipelines;
pub mod shaders;
pub mod storage;

// Re-export commonly used types
pub use app::{DrawOutcome, FramePresenter, SharedFrameSlot};
pub use backends::camera::format_converters::FormatConverter;
pub use backends::camera::types::{CaptureConfig, ChromaOrder, DropPolicy};
pub use bridge::{BridgeKind, FrameBridge};
pub use config::Config;
pub use pipelines::{CaptureSession, PipelineController};
