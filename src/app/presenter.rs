// SPDX-License-Identifier: GPL-3.0-only

//! Frame presentation on the render thread
//!
//! [`FramePresenter`] consumes the latest processed frame from the shared
//! slot, uploads it to a texture and draws it as a full-screen quad. It keeps
//! the last uploaded frame so a snapshot can be exported at any time without
//! touching the slot.
//!
//! The GPU itself sits behind [`GpuBackend`]. Resources are created lazily on
//! first use and released exactly once.

use super::frame_slot::SharedFrameSlot;
use crate::backends::camera::types::ProcessedFrame;
use crate::errors::{PresentError, SnapshotError};
use crate::pipelines::snapshot;
use crate::storage;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// GPU operations the presenter needs
///
/// Only ever called from the render thread.
pub trait GpuBackend {
    /// Create pipeline, sampler and quad geometry
    fn create_resources(&mut self) -> Result<(), PresentError>;

    /// Size of the area the quad covers
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Replace the texture contents, recreating it if the dimensions changed
    fn upload(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<(), PresentError>;

    /// Draw the current texture as a full-screen triangle strip
    fn draw(&mut self) -> Result<(), PresentError>;

    /// Destroy all GPU objects
    fn release(&mut self);
}

/// What a draw callback did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// A new frame was uploaded and drawn
    Drawn { width: u32, height: u32 },
    /// No new frame, but the viewport changed so the previous texture was redrawn
    Redrawn,
    /// The slot was empty; the previous image stays on screen
    SkippedEmpty,
    /// The frame declared a zero dimension
    SkippedZeroDimensions,
    /// The frame's buffer length did not match its dimensions
    RejectedLength { expected: usize, actual: usize },
    /// The backend failed; the frame was dropped
    Failed,
}

/// Cross-thread view of the last uploaded frame
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    last: Arc<Mutex<Option<Arc<ProcessedFrame>>>>,
}

impl SnapshotHandle {
    fn lock(&self) -> MutexGuard<'_, Option<Arc<ProcessedFrame>>> {
        self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set(&self, frame: Arc<ProcessedFrame>) {
        let previous = self.lock().replace(frame);
        drop(previous);
    }

    /// The last uploaded frame, if any
    pub fn latest(&self) -> Option<Arc<ProcessedFrame>> {
        self.lock().clone()
    }

    /// Write the last uploaded frame to `path` as PNG
    pub fn export_to(&self, path: &Path) -> Result<PathBuf, SnapshotError> {
        let frame = self.latest().ok_or(SnapshotError::NoFrame)?;
        snapshot::write_png(&frame, path)?;
        Ok(path.to_path_buf())
    }

    /// Write the last uploaded frame under a fresh name in `dir`
    pub fn export_in(&self, dir: &Path) -> Result<PathBuf, SnapshotError> {
        // Check before picking a name so a missing frame costs nothing
        if self.latest().is_none() {
            return Err(SnapshotError::NoFrame);
        }
        self.export_to(&storage::next_snapshot_path(dir))
    }
}

impl std::fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims = self.latest().map(|frame| (frame.width, frame.height));
        f.debug_struct("SnapshotHandle").field("last", &dims).finish()
    }
}

/// Owns the GPU objects and draws the latest frame
pub struct FramePresenter<B: GpuBackend> {
    backend: B,
    slot: Arc<SharedFrameSlot>,
    snapshots: SnapshotHandle,
    snapshot_dir: PathBuf,
    resources_ready: bool,
    released: bool,
    viewport: (u32, u32),
    viewport_dirty: bool,
    frames_drawn: u64,
    frames_rejected: u64,
}

impl<B: GpuBackend> FramePresenter<B> {
    pub fn new(backend: B, slot: Arc<SharedFrameSlot>) -> Self {
        Self {
            backend,
            slot,
            snapshots: SnapshotHandle::default(),
            snapshot_dir: storage::default_snapshot_dir(),
            resources_ready: false,
            released: false,
            viewport: (0, 0),
            viewport_dirty: false,
            frames_drawn: 0,
            frames_rejected: 0,
        }
    }

    /// Directory used by [`export_snapshot`](Self::export_snapshot)
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// Share an existing snapshot handle instead of a private one
    pub fn with_snapshot_handle(mut self, handle: SnapshotHandle) -> Self {
        self.snapshots = handle;
        self
    }

    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    fn ensure_resources(&mut self) -> Result<(), PresentError> {
        if self.released {
            return Err(PresentError::NotRunning);
        }
        if !self.resources_ready {
            self.backend.create_resources()?;
            self.resources_ready = true;
            debug!("Presenter GPU resources created");
        }
        Ok(())
    }

    /// The render context became available
    pub fn on_surface_created(&mut self) -> Result<(), PresentError> {
        self.ensure_resources()
    }

    /// The render target was resized; the quad always fills the viewport
    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        if self.viewport != (width, height) {
            self.viewport = (width, height);
            self.viewport_dirty = true;
            self.backend.set_viewport(width, height);
            debug!(width, height, "Viewport changed");
        }
    }

    /// Draw the latest published frame, if there is one
    pub fn on_draw_frame(&mut self) -> DrawOutcome {
        if let Err(e) = self.ensure_resources() {
            warn!(error = %e, "Cannot draw without GPU resources");
            return DrawOutcome::Failed;
        }

        let Some(frame) = self.slot.consume_latest() else {
            return self.redraw_if_resized();
        };

        if frame.width == 0 || frame.height == 0 {
            return DrawOutcome::SkippedZeroDimensions;
        }

        let expected = frame.expected_len();
        if frame.data.len() != expected {
            self.frames_rejected += 1;
            warn!(
                width = frame.width,
                height = frame.height,
                expected,
                actual = frame.data.len(),
                "Rejecting frame with mismatched buffer length"
            );
            return DrawOutcome::RejectedLength {
                expected,
                actual: frame.data.len(),
            };
        }

        if let Err(e) = self.backend.upload(&frame.data, frame.width, frame.height) {
            warn!(error = %e, "Texture upload failed");
            return DrawOutcome::Failed;
        }
        let (width, height) = (frame.width, frame.height);
        self.snapshots.set(frame);

        if let Err(e) = self.backend.draw() {
            warn!(error = %e, "Draw failed");
            return DrawOutcome::Failed;
        }

        self.viewport_dirty = false;
        self.frames_drawn += 1;
        DrawOutcome::Drawn { width, height }
    }

    fn redraw_if_resized(&mut self) -> DrawOutcome {
        if !self.viewport_dirty || self.snapshots.latest().is_none() {
            return DrawOutcome::SkippedEmpty;
        }
        match self.backend.draw() {
            Ok(()) => {
                self.viewport_dirty = false;
                DrawOutcome::Redrawn
            }
            Err(e) => {
                warn!(error = %e, "Redraw after resize failed");
                DrawOutcome::Failed
            }
        }
    }

    /// Export the currently displayed frame into the snapshot directory
    pub fn export_snapshot(&self) -> Result<PathBuf, SnapshotError> {
        self.snapshots.export_in(&self.snapshot_dir)
    }

    /// Export the currently displayed frame to an explicit path
    pub fn export_snapshot_to(&self, path: &Path) -> Result<PathBuf, SnapshotError> {
        self.snapshots.export_to(path)
    }

    /// Destroy GPU objects; later calls are no-ops
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.resources_ready {
            self.backend.release();
            self.resources_ready = false;
            info!(frames_drawn = self.frames_drawn, "Presenter GPU resources released");
        }
    }
}

impl<B: GpuBackend> Drop for FramePresenter<B> {
    fn drop(&mut self) {
        self.release();
    }
}
