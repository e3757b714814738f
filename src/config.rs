// SPDX-License-Identifier: GPL-3.0-only

//! Persistent settings
//!
//! Stored as JSON at `<config dir>/edge-viewer/config.json`. A missing file
//! means defaults; missing fields take their default value and unknown
//! fields are ignored.

use crate::backends::camera::SessionConfig;
use crate::backends::camera::types::{CaptureBackendType, Resolution};
use crate::constants::{
    ACQUISITION_QUEUE_DEPTH, APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_PREFERRED_RESOLUTION,
    DEFAULT_STOP_TIMEOUT, DEFAULT_SYNTHETIC_FPS,
};
use crate::pipelines::transform::TransformKind;
use crate::render::FilterMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture backend to use
    pub backend: CaptureBackendType,
    /// Resolution negotiated against each device's supported list
    pub preferred_resolution: Resolution,
    /// Image transform applied to every frame
    pub transform: TransformKind,
    /// Display filter at startup
    pub initial_filter: FilterMode,
    /// Raw frames buffered between the device and the capture loop
    pub queue_depth: usize,
    /// Bounded wait for the capture loop on stop, in milliseconds
    pub stop_timeout_ms: u64,
    /// Frame rate of the synthetic backend
    pub synthetic_fps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CaptureBackendType::default(),
            preferred_resolution: DEFAULT_PREFERRED_RESOLUTION,
            transform: TransformKind::default(),
            initial_filter: FilterMode::default(),
            queue_depth: ACQUISITION_QUEUE_DEPTH,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT.as_millis() as u64,
            synthetic_fps: DEFAULT_SYNTHETIC_FPS,
        }
    }
}

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory on this system")]
    NoConfigDir,

    #[error("Failed to access config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Default location of the configuration file
pub fn config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

impl Config {
    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path()?)
    }

    /// Load from `path`, returning defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Parameters for the capture session manager
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            preferred: self.preferred_resolution,
            queue_depth: self.queue_depth.max(1),
            stop_timeout: self.stop_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.preferred_resolution, Resolution::new(640, 480));
        assert_eq!(config.transform, TransformKind::Edges);
        assert_eq!(config.queue_depth, 3);
        assert_eq!(config.stop_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"transform": "gray", "unknown_field": 1}"#).unwrap();
        assert_eq!(config.transform, TransformKind::Gray);
        assert_eq!(config.synthetic_fps, DEFAULT_SYNTHETIC_FPS);
        assert_eq!(config.backend, CaptureBackendType::Synthetic);
    }

    #[test]
    fn test_session_config_clamps_queue_depth() {
        let config = Config {
            queue_depth: 0,
            stop_timeout_ms: 500,
            ..Default::default()
        };
        let session = config.session_config();
        assert_eq!(session.queue_depth, 1);
        assert_eq!(session.stop_timeout, Duration::from_millis(500));
    }
}
