// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipeline: `<source> ! videoconvert ! videoscale ! I420 caps ! appsink`

use crate::backends::camera::acquisition::{FrameSink, PushOutcome};
use crate::backends::camera::types::{CaptureConfig, FrameData, PlanarFrame, Plane, SensorFrame};
use crate::constants::{pipeline, timing};
use crate::errors::CaptureError;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::{VideoInfo, VideoMeta};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, trace, warn};

/// Build the launch description for a source at the configured size
pub fn launch_description(source: &str, config: &CaptureConfig) -> String {
    format!(
        "{source} ! videoconvert ! videoscale ! video/x-raw,format={format},width={width},height={height} ! appsink name=sink",
        source = source,
        format = pipeline::SENSOR_FORMAT,
        width = config.width,
        height = config.height,
    )
}

/// A running GStreamer capture pipeline delivering frames to a [`FrameSink`]
pub struct StreamPipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
}

impl StreamPipeline {
    /// Launch the pipeline and wait for it to reach PLAYING
    pub fn start(
        source: &str,
        config: &CaptureConfig,
        sink: FrameSink,
    ) -> Result<Self, CaptureError> {
        gstreamer::init().map_err(|e| CaptureError::SensorOpen(e.to_string()))?;

        let description = launch_description(source, config);
        info!(pipeline = %description, "Launching capture pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CaptureError::SensorOpen(format!("failed to parse pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| CaptureError::SensorOpen("launch result is not a pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::SensorOpen("failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| CaptureError::SensorOpen("failed to cast appsink".to_string()))?;

        appsink.set_property("emit-signals", true);
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", config.queue_depth as u32);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let sequence = AtomicU64::new(0);
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_num = sequence.fetch_add(1, Ordering::Relaxed);

                    let sample = appsink.pull_sample().map_err(|e| {
                        debug!(frame = frame_num, error = ?e, "Failed to pull sample");
                        gstreamer::FlowError::Eos
                    })?;

                    let frame = match frame_from_sample(&sample, frame_num) {
                        Ok(frame) => frame,
                        Err(e) => {
                            // Transient: drop this frame, keep streaming
                            if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                                warn!(frame = frame_num, error = %e, "Unusable sample");
                            }
                            return Ok(gstreamer::FlowSuccess::Ok);
                        }
                    };

                    match sink.push(SensorFrame::untracked(frame)) {
                        PushOutcome::Closed => Err(gstreamer::FlowError::Flushing),
                        outcome => {
                            trace!(frame = frame_num, outcome = ?outcome, "Sample delivered");
                            Ok(gstreamer::FlowSuccess::Ok)
                        }
                    }
                })
                .build(),
        );

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let err = classify_failure(&pipeline, &format!("failed to start pipeline: {}", e));
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(err);
        }

        let (result, state, pending) = pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
        if result.is_err() {
            let err = classify_failure(&pipeline, "pipeline did not reach PLAYING");
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(err);
        }

        info!("Capture pipeline playing");
        Ok(Self { pipeline, appsink })
    }

    /// Stop delivering frames and release the device
    pub fn stop(self) {
        // Drop the callback (and with it the sink) before tearing down
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            error!(error = ?e, "Failed to stop capture pipeline");
            return;
        }

        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        match result {
            Ok(_) => info!(state = ?state, "Capture pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline state change had issues"),
        }
    }
}

/// Turn a failed start into a permission or open error using the bus message
fn classify_failure(pipeline: &gstreamer::Pipeline, fallback: &str) -> CaptureError {
    let message = pipeline.bus().and_then(|bus| {
        bus.timed_pop_filtered(gstreamer::ClockTime::ZERO, &[gstreamer::MessageType::Error])
    });

    let Some(message) = message else {
        return CaptureError::SensorOpen(fallback.to_string());
    };

    match message.view() {
        gstreamer::MessageView::Error(err) => {
            let error = err.error();
            let text = error.message().to_string();
            if error.matches(gstreamer::ResourceError::NotAuthorized)
                || text.contains("Permission denied")
            {
                CaptureError::PermissionDenied(text)
            } else {
                CaptureError::SensorOpen(text)
            }
        }
        _ => CaptureError::SensorOpen(fallback.to_string()),
    }
}

/// Describe an I420 sample as a planar frame without copying its pixels
fn frame_from_sample(sample: &gstreamer::Sample, sequence: u64) -> Result<PlanarFrame, String> {
    let caps = sample.caps().ok_or("no caps in sample")?;
    let info = VideoInfo::from_caps(caps).map_err(|e| format!("invalid caps: {}", e))?;
    let buffer = sample.buffer_owned().ok_or("no buffer in sample")?;

    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
        return Err("buffer marked as corrupted".to_string());
    }

    // Video meta (when present) describes the real layout of this buffer
    let (strides, offsets): (Vec<i32>, Vec<usize>) = match buffer.meta::<VideoMeta>() {
        Some(meta) => (meta.stride().to_vec(), meta.offset().to_vec()),
        None => (info.stride().to_vec(), info.offset().to_vec()),
    };
    if strides.len() < 3 || offsets.len() < 3 {
        return Err(format!("expected 3 planes, got {}", strides.len()));
    }

    let width = info.width();
    let height = info.height();
    let chroma_rows = (height / 2) as usize;

    let mapped = buffer
        .into_mapped_buffer_readable()
        .map_err(|_| "failed to map buffer".to_string())?;
    let data = FrameData::from_mapped_buffer(mapped);

    let plane = |index: usize, rows: usize| {
        let stride = strides[index].max(0) as usize;
        Plane::view(data.clone(), offsets[index], stride * rows, stride, 1)
    };

    Ok(PlanarFrame {
        width,
        height,
        y: plane(0, height as usize),
        chroma_a: plane(1, chroma_rows),
        chroma_b: plane(2, chroma_rows),
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_description() {
        let config = CaptureConfig::default();
        assert_eq!(
            launch_description("v4l2src device=/dev/video0", &config),
            "v4l2src device=/dev/video0 ! videoconvert ! videoscale ! \
             video/x-raw,format=I420,width=640,height=480 ! appsink name=sink"
        );
    }
}
