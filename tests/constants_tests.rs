// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use camera_pipeline::constants::{app_info, pipeline, snapshot, timing};
use camera_pipeline::CaptureConfig;

#[test]
fn test_default_dimensions_fit_420_layout() {
    // 4:2:0 chroma needs even dimensions
    assert_eq!(pipeline::DEFAULT_WIDTH % 2, 0);
    assert_eq!(pipeline::DEFAULT_HEIGHT % 2, 0);
    assert!(CaptureConfig::default().validate().is_ok());
}

#[test]
fn test_queue_depth_bounds() {
    assert!(pipeline::DEFAULT_QUEUE_DEPTH >= 1);
    assert!(pipeline::DEFAULT_QUEUE_DEPTH <= pipeline::MAX_QUEUE_DEPTH);
}

#[test]
fn test_polling_faster_than_startup_timeout() {
    assert!(timing::SENSOR_POLL_MS < timing::START_TIMEOUT_SECS * 1000);
    assert!(timing::RENDER_POLL_MS < timing::START_TIMEOUT_SECS * 1000);
    assert!(timing::FRAME_LOG_INTERVAL > 0);
}

#[test]
fn test_snapshot_naming() {
    assert_eq!(snapshot::FILE_PREFIX, "processed");
    assert_eq!(snapshot::EXTENSION, "png");
}

#[test]
fn test_version_is_set() {
    assert!(!app_info::version().is_empty());
}
