// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot export of a displayed frame
//!
//! Snapshots are lossless PNG. Encoding happens in memory first so a failed
//! encode never leaves a truncated file behind.

use crate::backends::camera::types::ProcessedFrame;
use crate::errors::SnapshotError;
use image::{ImageFormat, RgbaImage};
use std::path::Path;
use tracing::{debug, info};

/// Encode an RGBA frame as PNG
pub fn encode_png(frame: &ProcessedFrame) -> Result<Vec<u8>, SnapshotError> {
    if !frame.is_consistent() {
        return Err(SnapshotError::InvalidFrame {
            expected: frame.expected_len(),
            actual: frame.data.len(),
        });
    }

    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or(
        SnapshotError::InvalidFrame {
            expected: frame.expected_len(),
            actual: frame.data.len(),
        },
    )?;

    let mut buffer = Vec::new();
    image.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)?;
    debug!(
        width = frame.width,
        height = frame.height,
        bytes = buffer.len(),
        "Snapshot encoded"
    );
    Ok(buffer)
}

/// Encode `frame` and write it to `path`, creating parent directories
pub fn write_png(frame: &ProcessedFrame, path: &Path) -> Result<(), SnapshotError> {
    let encoded = encode_png(frame)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| SnapshotError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, &encoded).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), "Snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_round_trip() {
        let data: Vec<u8> = (0..4 * 3 * 4).map(|i| i as u8).collect();
        let frame = ProcessedFrame::new(data.clone(), 4, 3);

        let encoded = encode_png(&frame).unwrap();
        let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.into_raw(), data);
    }

    #[test]
    fn test_encode_rejects_inconsistent_frame() {
        let frame = ProcessedFrame::new(vec![0; 10], 2, 2);
        match encode_png(&frame) {
            Err(SnapshotError::InvalidFrame { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 10);
            }
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_write_png_reports_io_error() {
        let dir = std::env::temp_dir().join(format!("camera-pipeline-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // A directory cannot be overwritten by a file
        let frame = ProcessedFrame::new(vec![255; 16], 2, 2);
        let result = write_png(&frame, &dir);
        assert!(matches!(result, Err(SnapshotError::Io { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
