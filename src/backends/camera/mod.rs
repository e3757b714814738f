// SPDX-License-Identifier: MPL-2.0

//! Capture backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ CaptureSessionManager│  ← start / stop / switch, capture loop
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureBackend trait │  ← enumerate, query resolutions, open
//! └──────────┬───────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌─────────┐ ┌──────┐
//!  │Synthetic│ │ V4L2 │
//!  └─────────┘ └──────┘
//! ```
//!
//! An open [`CaptureSession`] runs a repeating capture request: every frame
//! goes to the host's preview surface and to the acquisition queue that the
//! manager's capture loop drains.

pub mod frame_loop;
pub mod manager;
pub mod queue;
pub mod synthetic;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;

pub use manager::{CaptureSessionManager, SessionConfig};
pub use queue::{Acquired, FrameQueue};
pub use synthetic::{ChromaLayout, SyntheticBackend};
pub use types::*;

use crate::errors::{PipelineError, PipelineResult};

/// A source of capture devices
pub trait CaptureBackend: Send + Sync {
    fn backend_type(&self) -> CaptureBackendType;

    /// Whether the backend can be used on this system at all
    fn is_available(&self) -> bool;

    /// Devices currently attached, in backend order
    fn enumerate_devices(&self) -> Vec<CaptureDevice>;

    /// Output resolutions the device supports for 4:2:0 capture
    ///
    /// # Errors
    /// * `DeviceUnavailable` - the device is gone or cannot be queried
    fn supported_resolutions(&self, device: &CaptureDevice) -> PipelineResult<Vec<Resolution>>;

    /// Open `device` at `resolution` and start the repeating capture request
    /// towards both `targets`.
    ///
    /// # Errors
    /// * `DeviceUnavailable` - the device cannot be opened
    /// * `ConfigurationUnavailable` - the device refuses the resolution or format
    fn open(
        &self,
        device: &CaptureDevice,
        resolution: Resolution,
        targets: CaptureTargets,
    ) -> PipelineResult<Box<dyn CaptureSession>>;
}

/// A running repeating capture request
pub trait CaptureSession: Send {
    fn device(&self) -> &CaptureDevice;

    fn resolution(&self) -> Resolution;

    /// Stop producing frames and release the device. Safe to call twice.
    fn close(&mut self);
}

/// Create a backend of the given type
pub fn create_backend(
    backend_type: CaptureBackendType,
    synthetic_fps: u32,
) -> PipelineResult<Box<dyn CaptureBackend>> {
    match backend_type {
        CaptureBackendType::Synthetic => Ok(Box::new(SyntheticBackend::new(synthetic_fps))),
        #[cfg(target_os = "linux")]
        CaptureBackendType::V4l2 => Ok(Box::new(v4l2::V4l2Backend::new())),
        #[cfg(not(target_os = "linux"))]
        CaptureBackendType::V4l2 => Err(PipelineError::DeviceUnavailable(
            "V4L2 is only available on Linux".to_string(),
        )),
    }
}

/// Look up a device by id in the backend's current device list
pub(crate) fn find_device(
    backend: &dyn CaptureBackend,
    device: &CaptureDevice,
) -> PipelineResult<CaptureDevice> {
    backend
        .enumerate_devices()
        .into_iter()
        .find(|d| d.id == device.id)
        .ok_or_else(|| PipelineError::DeviceUnavailable(format!("{} is gone", device.name)))
}
