// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the pipeline
//!
//! This module provides command-line functionality for:
//! - Running the pipeline headless with an offscreen render target
//! - Exporting a single processed frame
//! - Printing the effective configuration

use camera_pipeline::app::{spawn_render_loop, RenderHandle, RenderOptions, WgpuBackend};
use camera_pipeline::backends::camera::gst::GstSensor;
use camera_pipeline::backends::camera::test_pattern::TestPatternSensor;
use camera_pipeline::backends::camera::Sensor;
use camera_pipeline::constants::timing;
use camera_pipeline::{gpu, BridgeKind, Config, PipelineController};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    /// Synthetic colour bars
    Test,
    /// V4L2 camera through GStreamer
    V4l2,
}

/// Pipeline components built from the configuration and command-line overrides
struct Pipeline {
    controller: PipelineController,
    render: RenderHandle,
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    }
}

fn build_sensor(source: SourceKind, device: Option<&str>) -> Box<dyn Sensor> {
    match source {
        SourceKind::Test => Box::new(TestPatternSensor::default()),
        SourceKind::V4l2 => Box::new(GstSensor::v4l2(device)),
    }
}

fn build_pipeline(
    config: &Config,
    source: SourceKind,
    device: Option<String>,
    bridge: Option<BridgeKind>,
) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let device = device.or_else(|| config.device.clone());
    let bridge = bridge.unwrap_or(config.bridge);
    let capture = config.to_capture_config();

    println!("Source: {:?}", source);
    println!("Bridge: {}", bridge.display_name());
    println!(
        "Capture format: {}x{} ({})",
        capture.width, capture.height, capture.chroma_order
    );

    let controller = PipelineController::new(
        build_sensor(source, device.as_deref()),
        bridge.build(capture.chroma_order),
        capture.clone(),
    );

    let (width, height) = (capture.width, capture.height);
    let render = spawn_render_loop(
        move || {
            let context = gpu::create_headless_device("camera-pipeline")?;
            Ok(WgpuBackend::offscreen(&context, width, height))
        },
        controller.slot(),
        RenderOptions {
            viewport: (width, height),
            snapshot_dir: config.snapshot_dir(),
        },
    )?;

    controller.set_redraw_requester(Some(render.redraw_callback()));
    controller.start()?;

    Ok(Pipeline { controller, render })
}

fn print_stats(pipeline: &Pipeline) {
    let stats = pipeline.controller.stats();
    println!("Frames received:  {}", stats.frames_received);
    println!("Frames published: {}", stats.frames_published);
    println!("Frames declined:  {}", stats.frames_declined);
    println!("Frames dropped:   {}", stats.frames_dropped);
    println!("Frames drawn:     {}", pipeline.render.stats().frames_drawn());
}

/// Run the pipeline until `duration` elapses or Ctrl+C
pub fn run(
    source: SourceKind,
    device: Option<String>,
    duration: u64,
    bridge: Option<BridgeKind>,
    snapshot: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();
    let pipeline = build_pipeline(&config, source, device, bridge)?;

    println!();
    println!("Running... (press Ctrl+C to stop early)");

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        let elapsed = start.elapsed().as_secs();
        print!(
            "\rRunning: {:02}:{:02}  frames drawn: {}",
            elapsed / 60,
            elapsed % 60,
            pipeline.render.stats().frames_drawn()
        );
        std::io::Write::flush(&mut std::io::stdout())?;

        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    pipeline.controller.stop();

    if snapshot {
        match pipeline.render.snapshot() {
            Ok(path) => println!("Snapshot saved: {}", path.display()),
            Err(e) => println!("Snapshot failed: {}", e),
        }
    }

    print_stats(&pipeline);
    pipeline.render.shutdown();
    Ok(())
}

/// Run until the first frame is drawn, then export it
pub fn snapshot(
    source: SourceKind,
    device: Option<String>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();
    let pipeline = build_pipeline(&config, source, device, None)?;

    println!("Waiting for first frame...");
    let deadline = Instant::now() + Duration::from_secs(timing::START_TIMEOUT_SECS);
    while pipeline.render.stats().frames_drawn() == 0 {
        if Instant::now() >= deadline {
            pipeline.controller.stop();
            return Err("no frame was drawn before the timeout".into());
        }
        std::thread::sleep(Duration::from_millis(timing::SENSOR_POLL_MS));
    }

    pipeline.controller.stop();

    let path = match output {
        Some(path) => pipeline.render.snapshot_to(&path)?,
        None => pipeline.render.snapshot()?,
    };
    println!("Snapshot saved: {}", path.display());

    pipeline.render.shutdown();
    Ok(())
}

/// Print the effective configuration as JSON
pub fn print_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();
    if let Ok(path) = Config::path() {
        println!("# {}", path.display());
    }
    println!("{}", config.to_json()?);
    Ok(())
}
