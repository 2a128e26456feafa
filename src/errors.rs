// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera pipeline
//!
//! Every failure in the pipeline is recoverable: start failures leave the
//! session idle, per-frame problems drop the frame, and snapshot failures are
//! returned to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening or running the capture side of the pipeline
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Access to the camera was refused by the system
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    /// The sensor could not be opened or configured
    #[error("failed to open sensor: {0}")]
    SensorOpen(String),
    /// The underlying media pipeline reported an error
    #[error("capture pipeline error: {0}")]
    Pipeline(String),
    /// The capture configuration cannot be used
    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),
    /// `start()` was called on a session that is not idle
    #[error("capture session is already running")]
    AlreadyRunning,
}

/// Errors raised by the GPU side of the pipeline
#[derive(Debug, Error)]
pub enum PresentError {
    /// No adapter or device could be created
    #[error("GPU initialization failed: {0}")]
    GpuInit(String),
    /// The presentation surface could not be acquired
    #[error("surface error: {0}")]
    Surface(String),
    /// The render thread is not available
    #[error("render loop is not running")]
    NotRunning,
}

/// Errors raised while exporting a snapshot of the displayed frame
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Nothing has been drawn yet
    #[error("no frame has been displayed yet")]
    NoFrame,
    /// The retained frame does not match its declared dimensions
    #[error("frame buffer is {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },
    /// Encoding to the image format failed
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] image::ImageError),
    /// Writing the encoded file failed
    #[error("failed to write snapshot to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("no configuration directory available")]
    NoConfigDir,
}

/// Result alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::PermissionDenied("/dev/video0".to_string());
        assert_eq!(err.to_string(), "camera permission denied: /dev/video0");
        assert_eq!(
            CaptureError::AlreadyRunning.to_string(),
            "capture session is already running"
        );
    }

    #[test]
    fn test_snapshot_error_display() {
        let err = SnapshotError::InvalidFrame {
            expected: 64,
            actual: 60,
        };
        assert_eq!(err.to_string(), "frame buffer is 60 bytes, expected 64");
        assert_eq!(
            SnapshotError::NoFrame.to_string(),
            "no frame has been displayed yet"
        );
    }

    #[test]
    fn test_config_error_from_json() {
        let parse_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ConfigError = parse_err.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
