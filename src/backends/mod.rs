// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! - [`camera`]: sensor trait, frame types, format conversion and the
//!   GStreamer and synthetic sensors

pub mod camera;
