// SPDX-License-Identifier: MPL-2.0

//! Edge Viewer - live camera frames through an image transform to the GPU
//!
//! This library captures 4:2:0 camera frames, repacks them as NV21, runs an
//! image transform producing RGBA, and draws the latest result with a
//! selectable display filter. The most recent processed frame can be copied
//! out at any time for export.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture backends and the capture session manager
//! - [`media`]: NV21 repacking and frame buffers
//! - [`pipelines`]: Transforms, admission control and the frame exchange
//! - [`render`]: GPU preview renderer and render loop
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use edge_viewer::{
//!     CaptureSessionManager, FrameExchange, FramePipeline, PreviewSurface, SessionConfig,
//!     SyntheticBackend, TransformKind,
//! };
//! use std::sync::Arc;
//!
//! let exchange = Arc::new(FrameExchange::new());
//! let pipeline = Arc::new(FramePipeline::new(
//!     Arc::clone(&exchange),
//!     Some(TransformKind::Edges.create()),
//! ));
//! let manager = CaptureSessionManager::new(
//!     Box::new(SyntheticBackend::default()),
//!     pipeline,
//!     SessionConfig::default(),
//! );
//! manager.start(&PreviewSurface::ready())?;
//! let latest = exchange.snapshot();
//! manager.stop();
//! # Ok::<(), edge_viewer::PipelineError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod media;
pub mod pipelines;
pub mod render;
pub mod shaders;

// Re-export commonly used types
pub use backends::camera::{
    CaptureBackend, CaptureBackendType, CaptureDevice, CaptureSessionManager, Facing,
    PreviewSurface, Resolution, SessionConfig, SyntheticBackend,
};
pub use config::Config;
pub use errors::{PipelineError, PipelineResult};
pub use media::buffers::Snapshot;
pub use pipelines::exchange::FrameExchange;
pub use pipelines::processor::{FrameOutcome, FramePipeline};
pub use pipelines::transform::{FrameTransform, TransformKind};
pub use render::{FilterMode, OffscreenSurface, PreviewRenderer};
