// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use edge_viewer::{CaptureBackendType, FilterMode, Resolution, TransformKind};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "edge-viewer")]
#[command(about = "Live camera preview through an image transform")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Configuration file (default: <config dir>/edge-viewer/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices and their resolutions
    List {
        /// Only list devices of this backend
        #[arg(short, long)]
        backend: Option<CaptureBackendType>,
    },

    /// Run the capture, transform and render pipeline
    Run {
        /// Run time in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Capture backend (overrides the config file)
        #[arg(short, long)]
        backend: Option<CaptureBackendType>,

        /// Preferred capture resolution, e.g. 1280x720
        #[arg(short, long)]
        resolution: Option<Resolution>,

        /// Image transform (overrides the config file)
        #[arg(short, long)]
        transform: Option<TransformKind>,

        /// Display filter at startup
        #[arg(short, long)]
        filter: Option<FilterMode>,

        /// Cycle the display filter every N seconds
        #[arg(long)]
        cycle_filter: Option<u64>,

        /// Switch to the next capture device every N seconds
        #[arg(long)]
        switch_every: Option<u64>,

        /// Save the last processed frame as PNG when done
        #[arg(short, long)]
        export: bool,

        /// Export what is on the display (filter applied) instead of the processed frame
        #[arg(long, requires = "export")]
        export_display: bool,

        /// Output file for --export (default: ~/Pictures/edge-viewer/frame_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not render; only capture and transform
        #[arg(long)]
        no_gpu: bool,
    },

    /// Show the configuration file path and effective settings
    Config {
        /// Write the effective settings back to the file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=edge_viewer=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List { backend } => cli::list_cameras(backend, &config),
        Commands::Run {
            duration,
            backend,
            resolution,
            transform,
            filter,
            cycle_filter,
            switch_every,
            export,
            export_display,
            output,
            no_gpu,
        } => cli::run_pipeline(
            config,
            cli::RunOptions {
                duration,
                backend,
                resolution,
                transform,
                filter,
                cycle_filter,
                switch_every,
                export,
                export_display,
                output,
                no_gpu,
            },
        ),
        Commands::Config { save } => cli::show_config(cli.config.as_deref(), &config, save),
    }
}
