// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

/// Capture pipeline defaults
pub mod pipeline {
    /// Default capture width
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Default capture height
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Sensor frames held before the acquisition policy starts dropping
    /// (keep small for low latency)
    pub const DEFAULT_QUEUE_DEPTH: usize = 2;

    /// Upper bound accepted for the acquisition queue depth
    pub const MAX_QUEUE_DEPTH: usize = 16;

    /// Pixel format negotiated with the sensor
    pub const SENSOR_FORMAT: &str = "I420";

    /// Bytes per pixel of a processed frame
    pub const RGBA_BYTES_PER_PIXEL: usize = 4;
}

/// Timing constants
pub mod timing {
    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// How long the capture context waits for a frame before re-checking its stop signal
    pub const SENSOR_POLL_MS: u64 = 20;

    /// How long the render context waits for a command before re-checking its stop signal
    pub const RENDER_POLL_MS: u64 = 50;

    /// Interval between synthetic test pattern frames (~30 fps)
    pub const TEST_PATTERN_INTERVAL_MS: u64 = 33;
}

/// Snapshot export
pub mod snapshot {
    /// Filename prefix for exported snapshots
    pub const FILE_PREFIX: &str = "processed";

    /// Snapshots are always lossless PNG
    pub const EXTENSION: &str = "png";
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
