// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::types::Resolution;
use std::time::Duration;

/// Directory name used under the platform config and pictures directories
pub const APP_DIR_NAME: &str = "edge-viewer";

/// Configuration file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Target resolution when the configuration does not name one
pub const DEFAULT_PREFERRED_RESOLUTION: Resolution = Resolution::new(640, 480);

/// Frames the hardware may queue before the oldest is dropped
pub const ACQUISITION_QUEUE_DEPTH: usize = 3;

/// Upper bound on joining the capture thread during `stop()`
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the capture loop waits for a frame before rechecking its stop flag
pub const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Longest the render loop sleeps without a request before rechecking its stop flag
pub const RENDER_IDLE_WAKE: Duration = Duration::from_millis(100);

/// Instantaneous FPS readings are clamped to this value
pub const MAX_REPORTED_FPS: f32 = 120.0;

/// Samples in the smoothed FPS readout
pub const FPS_AVERAGE_WINDOW: usize = 10;

/// Frame rate of the synthetic capture device
pub const DEFAULT_SYNTHETIC_FPS: u32 = 30;

/// Periodic debug logs on hot paths fire once per this many frames
pub const FRAME_LOG_INTERVAL: u64 = 60;

/// Timing constants for the headless runner
pub mod timing {
    use std::time::Duration;

    /// Interval between smoothed FPS reports
    pub const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

    /// Main thread tick while a run is in progress
    pub const RUN_TICK: Duration = Duration::from_millis(20);
}
