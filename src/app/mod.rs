// SPDX-License-Identifier: GPL-3.0-only

//! Render side of the pipeline
//!
//! - `frame_slot`: Latest-frame hand-off from the capture thread
//! - `presenter`: Consumes the slot and draws through a [`GpuBackend`]
//! - `video_primitive`: wgpu implementation of [`GpuBackend`]
//! - `render_loop`: Render thread driven by redraw requests

pub mod frame_slot;
pub mod presenter;
pub mod render_loop;
pub mod video_primitive;

pub use frame_slot::SharedFrameSlot;
pub use presenter::{DrawOutcome, FramePresenter, GpuBackend, SnapshotHandle};
pub use render_loop::{spawn_render_loop, RedrawCallback, RenderHandle, RenderOptions};
pub use video_primitive::WgpuBackend;
