// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipeline and its lifecycle
//!
//! ```text
//! ┌──────────┐    ┌─────────────────────────────────────┐    ┌────────────┐
//! │  Sensor  │ ─▶ │           CaptureSession            │ ─▶ │ Frame slot │
//! │  (I420)  │    │  queue ▶ convert ▶ release ▶ bridge │    │   (RGBA)   │
//! └──────────┘    └─────────────────────────────────────┘    └────────────┘
//! ```
//!
//! # Modules
//!
//! - [`capture_session`]: Session state machine and the capture thread
//! - [`controller`]: Start/stop surface used by applications
//! - [`snapshot`]: PNG encoding of displayed frames

pub mod capture_session;
pub mod controller;
pub mod snapshot;

pub use capture_session::{CaptureSession, SessionState, SessionStats};
pub use controller::PipelineController;
