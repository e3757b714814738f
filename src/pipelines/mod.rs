// SPDX-License-Identifier: MPL-2.0

//! Frame processing pipeline
//!
//! Everything between a raw hardware frame and a published RGBA frame:
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │  Raw Frame   │ ──▶ │  FramePipeline    │ ──▶ │FrameExchange │ ──▶ render / snapshot
//! │  (YUV 4:2:0) │     │  - admission      │     │ (latest slot)│
//! │              │     │  - NV21 repack    │     │              │
//! │              │     │  - transform      │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Design Principles
//!
//! 1. **At most one frame in flight**: frames arriving while one is being
//!    processed are dropped, never queued
//! 2. **No per-frame allocation**: frame-sized buffers live as long as the
//!    resolution does
//! 3. **Latest wins**: the render path always sees the newest complete frame

pub mod exchange;
pub mod processor;
pub mod telemetry;
pub mod transform;

pub use exchange::{AdmissionGuard, FrameExchange, LatestFrame};
pub use processor::{FrameOutcome, FramePipeline, PipelineStats, PublishListener, StatsSnapshot};
pub use telemetry::{FpsAverager, FpsMeter};
pub use transform::{FrameTransform, TransformKind, TransformStage};
