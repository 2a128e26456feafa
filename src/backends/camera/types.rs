// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the capture side of the pipeline

//! Frame and configuration types shared by sensors, the converter and the session

use crate::constants::pipeline;
use crate::errors::CaptureError;
use gstreamer::buffer::{MappedBuffer, Readable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Frame data storage - either pre-copied bytes or zero-copy GStreamer buffer
///
/// The `Mapped` variant keeps the GStreamer buffer mapped and alive until all
/// planes referencing it are dropped, so a sensor frame can be handed to the
/// converter without copying the pixels first.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (synthetic sources, tests)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped GStreamer buffer
    Mapped(Arc<MappedBuffer<Readable>>),
}

impl FrameData {
    /// Create FrameData from a mapped GStreamer buffer (zero-copy)
    pub fn from_mapped_buffer(buffer: MappedBuffer<Readable>) -> Self {
        FrameData::Mapped(Arc::new(buffer))
    }

    pub fn len(&self) -> usize {
        match self {
            FrameData::Copied(data) => data.len(),
            FrameData::Mapped(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(bytes: Vec<u8>) -> Self {
        FrameData::Copied(Arc::from(bytes))
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            FrameData::Mapped(buf) => write!(f, "FrameData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

/// One plane of a planar frame
///
/// A plane is a window `[offset, offset + len)` into shared frame storage.
/// Several planes may view the same storage, which is how sensors that
/// interleave both chroma channels in one buffer expose them.
#[derive(Debug, Clone)]
pub struct Plane {
    data: FrameData,
    offset: usize,
    len: usize,
    /// Byte distance between the starts of consecutive rows
    pub row_stride: usize,
    /// Byte distance between consecutive samples within a row
    pub pixel_stride: usize,
}

impl Plane {
    /// Plane covering the whole of `data`
    pub fn new(data: impl Into<FrameData>, row_stride: usize, pixel_stride: usize) -> Self {
        let data = data.into();
        let len = data.len();
        Self {
            data,
            offset: 0,
            len,
            row_stride,
            pixel_stride,
        }
    }

    /// Plane viewing `len` bytes of `data` starting at `offset`
    pub fn view(
        data: FrameData,
        offset: usize,
        len: usize,
        row_stride: usize,
        pixel_stride: usize,
    ) -> Self {
        Self {
            data,
            offset,
            len,
            row_stride,
            pixel_stride,
        }
    }

    /// The plane's bytes, clamped to the backing storage
    pub fn bytes(&self) -> &[u8] {
        let data: &[u8] = &self.data;
        let start = self.offset.min(data.len());
        let end = self.offset.saturating_add(self.len).min(data.len());
        &data[start..end]
    }

    /// Bytes available from `start` to the end of the plane
    pub fn remaining_from(&self, start: usize) -> usize {
        self.bytes().len().saturating_sub(start)
    }
}

/// A planar 4:2:0 frame as delivered by a sensor
///
/// `chroma_a` is the first chroma plane (U/Cb for I420) and `chroma_b` the
/// second (V/Cr). Width and height are even.
#[derive(Debug, Clone)]
pub struct PlanarFrame {
    pub width: u32,
    pub height: u32,
    pub y: Plane,
    pub chroma_a: Plane,
    pub chroma_b: Plane,
    /// Sensor sequence number
    pub sequence: u64,
}

impl PlanarFrame {
    /// Chroma plane dimensions (width/2, height/2)
    pub fn chroma_size(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }
}

/// A frame acquired from a sensor, released exactly once
///
/// The release callback runs when the frame is released explicitly or when
/// it is dropped, whichever comes first. This covers frames evicted from the
/// acquisition queue, frames discarded on shutdown and frames whose
/// processing bails out early.
pub struct SensorFrame {
    frame: PlanarFrame,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl SensorFrame {
    pub fn new(frame: PlanarFrame, on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            frame,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// Frame whose release needs no bookkeeping (the storage is freed on drop)
    pub fn untracked(frame: PlanarFrame) -> Self {
        Self {
            frame,
            on_release: None,
        }
    }

    pub fn planar(&self) -> &PlanarFrame {
        &self.frame
    }

    /// Hand the frame resource back to the sensor
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SensorFrame {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SensorFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorFrame")
            .field("width", &self.frame.width)
            .field("height", &self.frame.height)
            .field("sequence", &self.frame.sequence)
            .finish()
    }
}

/// Order of the two chroma samples in each interleaved pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChromaOrder {
    /// V before U (second chroma plane first)
    #[default]
    Nv21,
    /// U before V (first chroma plane first)
    Nv12,
}

impl std::fmt::Display for ChromaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChromaOrder::Nv21 => write!(f, "NV21"),
            ChromaOrder::Nv12 => write!(f, "NV12"),
        }
    }
}

/// What the acquisition queue does when a frame arrives while it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DropPolicy {
    /// Evict the oldest queued frame; consumers always take the newest frame
    #[default]
    DropOldest,
    /// Reject the incoming frame; consumers take frames in arrival order
    DropNewest,
}

/// A semi-planar buffer: full Y plane followed by interleaved chroma pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemiPlanarBuffer {
    pub width: u32,
    pub height: u32,
    pub order: ChromaOrder,
    pub data: Vec<u8>,
}

impl SemiPlanarBuffer {
    /// Size of a semi-planar buffer for the given dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;
        luma + 2 * (luma / 4)
    }

    pub fn y_plane(&self) -> &[u8] {
        let luma = self.width as usize * self.height as usize;
        &self.data[..luma.min(self.data.len())]
    }

    pub fn chroma(&self) -> &[u8] {
        let luma = self.width as usize * self.height as usize;
        &self.data[luma.min(self.data.len())..]
    }
}

/// A fully decoded 4-channel frame produced by a frame bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ProcessedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Length an RGBA buffer of these dimensions must have
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * pipeline::RGBA_BYTES_PER_PIXEL
    }

    /// Whether the buffer length agrees with the declared dimensions
    pub fn is_consistent(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}

/// Capture parameters handed to a sensor when it is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// Frames held by the acquisition queue
    pub queue_depth: usize,
    pub drop_policy: DropPolicy,
    pub chroma_order: ChromaOrder,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: pipeline::DEFAULT_WIDTH,
            height: pipeline::DEFAULT_HEIGHT,
            queue_depth: pipeline::DEFAULT_QUEUE_DEPTH,
            drop_policy: DropPolicy::default(),
            chroma_order: ChromaOrder::default(),
        }
    }
}

impl CaptureConfig {
    /// Reject dimensions the 4:2:0 layout cannot represent and unusable queue depths
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "dimensions must be even for 4:2:0 chroma, got {}x{}",
                self.width, self.height
            )));
        }
        if self.queue_depth == 0 || self.queue_depth > pipeline::MAX_QUEUE_DEPTH {
            return Err(CaptureError::InvalidConfig(format!(
                "queue depth must be between 1 and {}, got {}",
                pipeline::MAX_QUEUE_DEPTH,
                self.queue_depth
            )));
        }
        Ok(())
    }
}
