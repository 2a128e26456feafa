// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for the capture pipeline
//!
//! [`FormatConverter`] turns a planar 4:2:0 sensor frame into a semi-planar
//! buffer, honouring independent row strides and a chroma pixel stride.
//! [`semi_planar_to_rgba`] decodes such a buffer for display (BT.601).

use super::types::{ChromaOrder, PlanarFrame, Plane, SemiPlanarBuffer};

/// Stride-aware planar to semi-planar converter
///
/// Stateless apart from the chroma pair order it emits. The output size is
/// fixed by the frame dimensions and computed before any copying; source
/// reads are clamped to the bytes each plane actually has, and samples that
/// fall outside a plane stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatConverter {
    order: ChromaOrder,
}

impl FormatConverter {
    pub fn new(order: ChromaOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ChromaOrder {
        self.order
    }

    /// Convert a planar frame into a freshly allocated semi-planar buffer
    pub fn convert(&self, frame: &PlanarFrame) -> SemiPlanarBuffer {
        let mut data = Vec::new();
        self.convert_into(frame, &mut data);
        SemiPlanarBuffer {
            width: frame.width,
            height: frame.height,
            order: self.order,
            data,
        }
    }

    /// Convert into `out`, reusing its allocation
    ///
    /// `out` is resized to exactly [`SemiPlanarBuffer::expected_len`] bytes
    /// and zero-filled before the planes are copied in.
    pub fn convert_into(&self, frame: &PlanarFrame, out: &mut Vec<u8>) {
        let width = frame.width as usize;
        let height = frame.height as usize;
        let luma_size = width * height;

        out.clear();
        out.resize(SemiPlanarBuffer::expected_len(frame.width, frame.height), 0);

        let (luma, chroma) = out.split_at_mut(luma_size);
        copy_luma(&frame.y, width, height, luma);
        interleave_chroma(
            &frame.chroma_a,
            &frame.chroma_b,
            width,
            height,
            self.order,
            chroma,
        );
    }
}

/// Copy the Y plane, stripping row padding when the stride exceeds the width
fn copy_luma(plane: &Plane, width: usize, height: usize, out: &mut [u8]) {
    let src = plane.bytes();
    let total = width * height;

    if plane.row_stride == width && src.len() >= total {
        out[..total].copy_from_slice(&src[..total]);
        return;
    }

    let stride = plane.row_stride.max(width);
    for row in 0..height {
        let start = row * stride;
        let count = width.min(plane.remaining_from(start));
        if count == 0 {
            break;
        }
        out[row * width..row * width + count].copy_from_slice(&src[start..start + count]);
    }
}

/// Emit `width/2` chroma pairs for each of the `height/2` chroma rows
fn interleave_chroma(
    first: &Plane,
    second: &Plane,
    width: usize,
    height: usize,
    order: ChromaOrder,
    out: &mut [u8],
) {
    let chroma_width = width / 2;
    let chroma_height = height / 2;

    for row in 0..chroma_height {
        let first_row = chroma_row(first, row);
        let second_row = chroma_row(second, row);
        let first_step = first.pixel_stride.max(1);
        let second_step = second.pixel_stride.max(1);
        let dst = &mut out[row * width..(row + 1) * width];

        for col in 0..chroma_width {
            let a = first_row.get(col * first_step).copied();
            let b = second_row.get(col * second_step).copied();
            let (lead, trail) = match order {
                ChromaOrder::Nv21 => (b, a),
                ChromaOrder::Nv12 => (a, b),
            };
            if let Some(value) = lead {
                dst[col * 2] = value;
            }
            if let Some(value) = trail {
                dst[col * 2 + 1] = value;
            }
        }
    }
}

/// Bytes of one chroma row: at most one stride, never past the plane's end
fn chroma_row(plane: &Plane, row: usize) -> &[u8] {
    let src = plane.bytes();
    let start = row * plane.row_stride;
    let len = plane.row_stride.min(plane.remaining_from(start));
    if len == 0 {
        return &[];
    }
    &src[start..start + len]
}

/// Decode a semi-planar buffer to RGBA using BT.601 coefficients
///
/// Returns `None` if the buffer is shorter than the dimensions require.
pub fn semi_planar_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    order: ChromaOrder,
) -> Option<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 || data.len() < SemiPlanarBuffer::expected_len(width, height) {
        return None;
    }

    let (luma, chroma) = data.split_at(w * h);
    let mut rgba = Vec::with_capacity(w * h * 4);

    for y in 0..h {
        let chroma_row = &chroma[(y / 2) * w..];
        for x in 0..w {
            let pair = (x / 2) * 2;
            let (u, v) = match order {
                ChromaOrder::Nv21 => (chroma_row[pair + 1], chroma_row[pair]),
                ChromaOrder::Nv12 => (chroma_row[pair], chroma_row[pair + 1]),
            };
            let [r, g, b] = yuv_to_rgb(luma[y * w + x], u, v);
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }

    Some(rgba)
}

/// YUV to RGB conversion (BT.601, full range)
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
    [r, g, b]
}
