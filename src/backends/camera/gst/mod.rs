// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer sensor
//!
//! Captures from a V4L2 device (or any GStreamer source description) through
//! an `appsink` negotiated to I420 at the configured size. Strides and plane
//! offsets come from the negotiated caps or the buffer's video meta, and the
//! buffer stays mapped (zero-copy) until the converter has read it.

pub mod pipeline;

use super::Sensor;
use super::acquisition::FrameSink;
use super::types::CaptureConfig;
use crate::errors::CaptureError;
use pipeline::StreamPipeline;
use tracing::info;

/// [`Sensor`] backed by a GStreamer capture pipeline
pub struct GstSensor {
    source: String,
    stream: Option<StreamPipeline>,
}

impl GstSensor {
    /// Capture from a V4L2 device, or the default device when `None`
    pub fn v4l2(device: Option<&str>) -> Self {
        let source = match device {
            Some(path) => format!("v4l2src device={}", path),
            None => "v4l2src".to_string(),
        };
        Self::from_source(source)
    }

    /// Capture from an arbitrary source description, e.g. `videotestsrc is-live=true`
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            stream: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Sensor for GstSensor {
    fn name(&self) -> &str {
        &self.source
    }

    fn open(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<(), CaptureError> {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }

        let stream = StreamPipeline::start(&self.source, config, sink)?;
        self.stream = Some(stream);
        info!(source = %self.source, "GStreamer sensor opened");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            info!(source = %self.source, "GStreamer sensor closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for GstSensor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v4l2_source_description() {
        assert_eq!(GstSensor::v4l2(None).source(), "v4l2src");
        assert_eq!(
            GstSensor::v4l2(Some("/dev/video2")).source(),
            "v4l2src device=/dev/video2"
        );
    }

    #[test]
    fn test_closed_until_opened() {
        let mut sensor = GstSensor::from_source("videotestsrc");
        assert!(!sensor.is_open());
        // Closing an unopened sensor is a no-op
        sensor.close();
        assert!(!sensor.is_open());
    }
}
