// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing capture devices
//! - Running the pipeline headless, with optional rendering and PNG export
//! - Inspecting the configuration

use chrono::Local;
use edge_viewer::backends::camera::create_backend;
use edge_viewer::config::{self, Config};
use edge_viewer::constants::{APP_DIR_NAME, timing};
use edge_viewer::gpu::create_render_device_blocking;
use edge_viewer::pipelines::telemetry::FpsAverager;
use edge_viewer::render::{self, FilterSelector, RenderHandle, RenderHooks};
use edge_viewer::{
    CaptureBackendType, CaptureSessionManager, FilterMode, FrameExchange, FramePipeline,
    OffscreenSurface, PreviewRenderer, PreviewSurface, Resolution, Snapshot, TransformKind,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How long `--export-display` waits for the render loop
const READBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Options of the `run` command; `None` falls back to the configuration
pub struct RunOptions {
    pub duration: u64,
    pub backend: Option<CaptureBackendType>,
    pub resolution: Option<Resolution>,
    pub transform: Option<TransformKind>,
    pub filter: Option<FilterMode>,
    pub cycle_filter: Option<u64>,
    pub switch_every: Option<u64>,
    pub export: bool,
    pub export_display: bool,
    pub output: Option<PathBuf>,
    pub no_gpu: bool,
}

/// Load the configuration from `path` or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// List all capture devices
pub fn list_cameras(
    backend: Option<CaptureBackendType>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let backends = match backend {
        Some(backend) => vec![backend],
        None => vec![CaptureBackendType::Synthetic, CaptureBackendType::V4l2],
    };

    for backend_type in backends {
        let backend = match create_backend(backend_type, config.synthetic_fps) {
            Ok(backend) if backend.is_available() => backend,
            Ok(_) => {
                println!("{}: not available", backend_type);
                println!();
                continue;
            }
            Err(e) => {
                println!("{}: {}", backend_type, e);
                println!();
                continue;
            }
        };

        let devices = backend.enumerate_devices();
        if devices.is_empty() {
            println!("{}: no devices found", backend_type);
            println!();
            continue;
        }

        println!("{} devices:", backend_type);
        println!();
        for (index, device) in devices.iter().enumerate() {
            println!("  [{}] {} ({}, {})", index, device.name, device.facing, device.id);
            match backend.supported_resolutions(device) {
                Ok(resolutions) if !resolutions.is_empty() => {
                    let res_strs: Vec<String> =
                        resolutions.iter().map(ToString::to_string).collect();
                    println!("      Resolutions: {}", res_strs.join(", "));
                }
                Ok(_) => println!("      Resolutions: none"),
                Err(e) => println!("      Resolutions: {}", e),
            }
        }
        println!();
    }

    Ok(())
}

/// Renderer pieces that exist only when a GPU is available
struct Display {
    handle: RenderHandle,
    fps: Arc<Mutex<FpsAverager>>,
}

fn start_display(
    pipeline: &FramePipeline,
    exchange: &Arc<FrameExchange>,
    filter: &FilterSelector,
    resolution: Resolution,
) -> Option<Display> {
    let gpu = match create_render_device_blocking("edge-viewer") {
        Ok(gpu) => gpu,
        Err(e) => {
            warn!(error = %e, "Rendering disabled");
            println!("No GPU available, running without display: {}", e);
            return None;
        }
    };

    let surface = OffscreenSurface::new(&gpu.device, resolution.width, resolution.height);
    let renderer = match PreviewRenderer::new(gpu, OffscreenSurface::FORMAT) {
        Ok(renderer) => renderer,
        Err(e) => {
            warn!(error = %e, "Failed to create preview renderer");
            println!("Rendering disabled: {}", e);
            return None;
        }
    };

    let fps = Arc::new(Mutex::new(FpsAverager::default()));
    let fps_sink = Arc::clone(&fps);
    let hooks = RenderHooks {
        on_fps: Some(Box::new(move |rate| {
            fps_sink
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(rate);
        })),
        frame_consumer: None,
    };

    let handle = render::spawn(
        renderer,
        Box::new(surface),
        Arc::clone(exchange),
        filter.clone(),
        hooks,
    );

    let requester = handle.requester();
    pipeline.set_listener(Some(Box::new(move || requester.request())));
    handle.request_render();

    Some(Display { handle, fps })
}

/// Run the pipeline for the requested duration
pub fn run_pipeline(config: Config, opts: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let backend_type = opts.backend.unwrap_or(config.backend);
    let transform = opts.transform.unwrap_or(config.transform);
    let mut session_config = config.session_config();
    if let Some(resolution) = opts.resolution {
        session_config.preferred = resolution;
    }

    let backend = create_backend(backend_type, config.synthetic_fps)?;
    if !backend.is_available() {
        return Err(format!("{} backend is not available", backend_type).into());
    }

    let exchange = Arc::new(FrameExchange::new());
    let pipeline = Arc::new(FramePipeline::new(
        Arc::clone(&exchange),
        Some(transform.create()),
    ));
    let manager = CaptureSessionManager::new(backend, Arc::clone(&pipeline), session_config);

    let preview = PreviewSurface::ready();
    manager.start(&preview)?;

    let resolution = manager
        .current_resolution()
        .ok_or("capture session ended during startup")?;
    if let Some(device) = manager.current_device() {
        println!("Using device: {} ({})", device.name, device.facing);
    }
    println!("Resolution: {}  Transform: {:?}", resolution, transform);

    let filter = FilterSelector::new(opts.filter.unwrap_or(config.initial_filter));
    let mut display = if opts.no_gpu {
        None
    } else {
        start_display(&pipeline, &exchange, &filter, resolution)
    };

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Running for {} seconds (press Ctrl+C to stop early)", opts.duration);

    let start = Instant::now();
    let target_duration = Duration::from_secs(opts.duration);
    let cycle_every = opts.cycle_filter.filter(|s| *s > 0).map(Duration::from_secs);
    let switch_every = opts.switch_every.filter(|s| *s > 0).map(Duration::from_secs);
    let mut last_report = start;
    let mut last_cycle = start;
    let mut last_switch = start;

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        std::thread::sleep(timing::RUN_TICK);
        let now = Instant::now();

        if let Some(every) = cycle_every
            && now.duration_since(last_cycle) >= every
        {
            last_cycle = now;
            let mode = match display.as_ref() {
                Some(display) => display.handle.next_filter(),
                None => filter.cycle(),
            };
            println!("Filter: {}", mode);
        }

        if let Some(every) = switch_every
            && now.duration_since(last_switch) >= every
        {
            last_switch = now;
            manager.switch_device(&preview)?;
            if let (Some(device), Some(resolution)) =
                (manager.current_device(), manager.current_resolution())
            {
                println!("Switched to {} at {}", device.name, resolution);
            }
        }

        if now.duration_since(last_report) >= timing::FPS_REPORT_INTERVAL {
            last_report = now;
            let stats = pipeline.stats();
            let fps = display
                .as_ref()
                .map(|d| d.fps.lock().unwrap_or_else(|e| e.into_inner()).average());
            info!(
                published = stats.published,
                busy = stats.busy,
                stale = stats.stale,
                skipped = stats.skipped,
                fps = fps.unwrap_or(0.0),
                "Pipeline status"
            );
            match fps {
                Some(fps) => print!("\rFrames: {}  FPS: {:.1}", stats.published, fps),
                None => print!("\rFrames: {}", stats.published),
            }
            std::io::Write::flush(&mut std::io::stdout())?;
        }
    }
    println!();

    if opts.export {
        let snapshot = match (opts.export_display, display.as_ref()) {
            (true, Some(display)) => display.handle.read_display(READBACK_TIMEOUT)?,
            (true, None) => {
                println!("No display to read back, exporting the processed frame");
                exchange.snapshot()
            }
            (false, _) => exchange.snapshot(),
        };
        match snapshot {
            Some(snapshot) => {
                let path = export_png(snapshot, opts.output)?;
                println!("Frame saved: {}", path.display());
            }
            None => println!("No frame to export"),
        }
    }

    if let Some(display) = display.as_mut() {
        pipeline.set_listener(None);
        display.handle.stop();
        println!("Frames rendered: {}", display.handle.frames_rendered());
    }
    manager.stop();

    let stats = pipeline.stats();
    println!(
        "Frames published: {}  dropped (busy): {}  stale: {}  skipped: {}",
        stats.published, stats.busy, stats.stale, stats.skipped
    );

    Ok(())
}

/// Save `snapshot` as PNG and return the path written
fn export_png(
    snapshot: Snapshot,
    output: Option<PathBuf>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            path
        }
        None => {
            let dir = get_default_export_dir();
            std::fs::create_dir_all(&dir)?;
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("frame_{}.png", timestamp))
        }
    };

    let image = snapshot
        .into_image()
        .ok_or("snapshot size does not match its dimensions")?;
    image.save_with_format(&path, image::ImageFormat::Png)?;
    Ok(path)
}

/// Get default export directory
fn get_default_export_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR_NAME)
}

/// Print the configuration path and effective settings
pub fn show_config(
    path: Option<&Path>,
    config: &Config,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::config_path()?,
    };

    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("(not present, showing defaults)");
    }
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save_to(&path)?;
        println!("Saved.");
    }
    Ok(())
}
