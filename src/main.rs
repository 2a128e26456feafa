// SPDX-License-Identifier: GPL-3.0-only

use camera_pipeline::BridgeKind;
use clap::{Parser, Subcommand};
use cli::SourceKind;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-pipeline")]
#[command(about = "Camera frame pipeline: capture, process and render")]
#[command(version = camera_pipeline::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline headless
    Run {
        /// Frame source
        #[arg(short, long, value_enum, default_value = "test")]
        source: SourceKind,

        /// V4L2 device path (default: from config, then the first camera)
        #[arg(short, long)]
        device: Option<String>,

        /// Run duration in seconds
        #[arg(short = 't', long, default_value = "10")]
        duration: u64,

        /// Processing routine (edge or color; default: from config)
        #[arg(short, long)]
        bridge: Option<BridgeKind>,

        /// Export the last drawn frame before exiting
        #[arg(long)]
        snapshot: bool,
    },

    /// Export the first processed frame
    Snapshot {
        /// Frame source
        #[arg(short, long, value_enum, default_value = "test")]
        source: SourceKind,

        /// V4L2 device path
        #[arg(short, long)]
        device: Option<String>,

        /// Output file path (default: ~/Downloads/processed_TIMESTAMP_NNN.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_pipeline=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            device,
            duration,
            bridge,
            snapshot,
        } => cli::run(source, device, duration, bridge, snapshot),
        Commands::Snapshot {
            source,
            device,
            output,
        } => cli::snapshot(source, device, output),
        Commands::Config => cli::print_config(),
    }
}
