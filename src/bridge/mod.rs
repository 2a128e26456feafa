// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing routines
//!
//! A [`FrameBridge`] takes one semi-planar frame and either produces a
//! decoded RGBA frame or declines. Declining is not an error: the frame is
//! dropped and whatever was displayed before stays on screen.

use crate::backends::camera::format_converters::semi_planar_to_rgba;
use crate::backends::camera::types::{ChromaOrder, SemiPlanarBuffer};
use serde::{Deserialize, Serialize};

/// Pixel processing routine called once per captured frame
///
/// Called repeatedly from the capture thread only.
pub trait FrameBridge: Send {
    /// Process a semi-planar frame of `width` x `height`
    ///
    /// Returns an RGBA buffer of exactly `width * height * 4` bytes, or `None`
    /// when the routine produces no output for this frame.
    fn process(&mut self, semi_planar: &[u8], width: u32, height: u32) -> Option<Vec<u8>>;

    fn name(&self) -> &'static str;
}

/// Available processing routines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BridgeKind {
    /// Edge map of the luma plane
    #[default]
    Edge,
    /// Plain colour decode
    Color,
}

impl BridgeKind {
    pub const ALL: [BridgeKind; 2] = [BridgeKind::Edge, BridgeKind::Color];

    /// Construct the routine for frames using `order`
    pub fn build(self, order: ChromaOrder) -> Box<dyn FrameBridge> {
        match self {
            BridgeKind::Edge => Box::new(EdgeBridge::default()),
            BridgeKind::Color => Box::new(ColorBridge::new(order)),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BridgeKind::Edge => "edge",
            BridgeKind::Color => "color",
        }
    }
}

impl std::str::FromStr for BridgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "edge" | "edges" => Ok(BridgeKind::Edge),
            "color" | "colour" => Ok(BridgeKind::Color),
            other => Err(format!("unknown bridge '{}'", other)),
        }
    }
}

/// Decodes the semi-planar frame to RGBA (BT.601)
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorBridge {
    order: ChromaOrder,
}

impl ColorBridge {
    pub fn new(order: ChromaOrder) -> Self {
        Self { order }
    }
}

impl FrameBridge for ColorBridge {
    fn process(&mut self, semi_planar: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
        semi_planar_to_rgba(semi_planar, width, height, self.order)
    }

    fn name(&self) -> &'static str {
        "color"
    }
}

/// Sobel edge map of the luma plane, white edges on black
///
/// Gradient magnitude is the L1 norm `|gx| + |gy|`; pixels at or above
/// `threshold` become white. Border pixels sample the nearest edge pixel.
#[derive(Debug, Clone, Copy)]
pub struct EdgeBridge {
    pub threshold: u32,
}

impl Default for EdgeBridge {
    fn default() -> Self {
        Self { threshold: 100 }
    }
}

impl FrameBridge for EdgeBridge {
    fn process(&mut self, semi_planar: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
        let w = width as usize;
        let h = height as usize;
        if w == 0 || h == 0 || semi_planar.len() < SemiPlanarBuffer::expected_len(width, height) {
            return None;
        }

        let luma = &semi_planar[..w * h];
        let sample = |x: isize, y: isize| -> i32 {
            let x = x.clamp(0, w as isize - 1) as usize;
            let y = y.clamp(0, h as isize - 1) as usize;
            luma[y * w + x] as i32
        };

        let mut rgba = vec![0u8; w * h * 4];
        for py in 0..h {
            for px in 0..w {
                let x = px as isize;
                let y = py as isize;

                let tl = sample(x - 1, y - 1);
                let tm = sample(x, y - 1);
                let tr = sample(x + 1, y - 1);
                let ml = sample(x - 1, y);
                let mr = sample(x + 1, y);
                let bl = sample(x - 1, y + 1);
                let bm = sample(x, y + 1);
                let br = sample(x + 1, y + 1);

                let gx = -tl - 2 * ml - bl + tr + 2 * mr + br;
                let gy = -tl - 2 * tm - tr + bl + 2 * bm + br;
                let magnitude = gx.unsigned_abs() + gy.unsigned_abs();

                let value = if magnitude >= self.threshold { 255 } else { 0 };
                let idx = (py * w + px) * 4;
                rgba[idx..idx + 4].copy_from_slice(&[value, value, value, 255]);
            }
        }

        Some(rgba)
    }

    fn name(&self) -> &'static str {
        "edge"
    }
}
