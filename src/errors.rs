// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture and render pipeline

use thiserror::Error;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised by capture, conversion, transform and rendering.
///
/// Session-level kinds (`DeviceUnavailable`, `ConfigurationUnavailable`,
/// `SurfaceUnavailable`) abort `start`/`switch_device` and leave the manager
/// stopped. Frame-level kinds drop one frame and keep the previous image on
/// screen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// No capture device could be found or opened
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The device reports no usable output resolution
    #[error("No usable capture configuration: {0}")]
    ConfigurationUnavailable(String),
    /// The preview target is not ready to receive frames
    #[error("Preview surface is not ready")]
    SurfaceUnavailable,
    /// Raw frame is not three-plane 4:2:0 or a plane is truncated
    #[error("Unsupported frame format: {0}")]
    UnsupportedFormat(String),
    /// Destination buffer shorter than the converted frame
    #[error("Buffer too small: need {required} bytes, have {actual}")]
    BufferTooSmall { required: usize, actual: usize },
    /// The frame transform is absent, reported failure, or panicked
    #[error("Frame transform failed: {0}")]
    TransformFailure(String),
    /// Shader module or render pipeline failed validation
    #[error("GPU program failure: {0}")]
    GpuProgramFailure(String),
    /// No adapter or device could be created
    #[error("GPU unavailable: {0}")]
    GpuUnavailable(String),
}

impl PipelineError {
    /// Whether this error ends the capture session rather than a single frame
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            PipelineError::DeviceUnavailable(_)
                | PipelineError::ConfigurationUnavailable(_)
                | PipelineError::SurfaceUnavailable
        )
    }
}
