// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame processing: admission, conversion, transform, publication
//!
//! ```text
//! RawFrame ──► admit? ──► NV21 repack ──► transform ──► epoch check ──► publish
//!                │ no                                        │ stale
//!                ▼                                           ▼
//!              drop                                       discard
//! ```
//!
//! Every resolution change or device switch starts a new epoch. Frames stamped
//! with an epoch that ended while they were in flight are never published, and
//! neither are frames captured before the current session's epoch began.

use super::exchange::FrameExchange;
use super::transform::{FrameTransform, TransformStage};
use crate::backends::camera::types::{RawFrame, Resolution};
use crate::constants::FRAME_LOG_INTERVAL;
use crate::errors::PipelineError;
use crate::media::buffers::{ConvertedBuffer, ProcessedFrame};
use crate::media::nv21_converter::yuv420_to_nv21;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What happened to a submitted frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Now visible to the render path
    Published,
    /// Another frame was in flight
    Busy,
    /// Processing is switched off
    Disabled,
    /// Its epoch ended, or a newer frame was already published
    Stale,
    /// Conversion or transform failed; the previous frame stays visible
    Skipped(PipelineError),
}

/// Callback fired after each publication (typically a render request)
pub type PublishListener = Box<dyn Fn() + Send + Sync>;

/// Counters for frames that went through [`FramePipeline::process`]
#[derive(Debug, Default)]
pub struct PipelineStats {
    published: AtomicU64,
    busy: AtomicU64,
    stale: AtomicU64,
    skipped: AtomicU64,
    allocations: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub published: u64,
    pub busy: u64,
    pub stale: u64,
    pub skipped: u64,
    /// Processed-frame buffers allocated so far
    pub allocations: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
        }
    }
}

/// State touched only by the frame currently in flight
struct Producer {
    resolution: Option<Resolution>,
    epoch: u64,
    /// When the last `prepare` ran; earlier captures belong to a closed session
    session_started: Option<Instant>,
    converted: ConvertedBuffer,
    spare: Option<Arc<ProcessedFrame>>,
    transform: TransformStage,
}

/// Converts, transforms and publishes raw frames
pub struct FramePipeline {
    exchange: Arc<FrameExchange>,
    producer: Mutex<Producer>,
    epoch: AtomicU64,
    enabled: AtomicBool,
    listener: Mutex<Option<PublishListener>>,
    stats: PipelineStats,
}

impl FramePipeline {
    pub fn new(exchange: Arc<FrameExchange>, transform: Option<Box<dyn FrameTransform>>) -> Self {
        Self {
            exchange,
            producer: Mutex::new(Producer {
                resolution: None,
                epoch: 0,
                session_started: None,
                converted: ConvertedBuffer::default(),
                spare: None,
                transform: TransformStage::new(transform),
            }),
            epoch: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            listener: Mutex::new(None),
            stats: PipelineStats::default(),
        }
    }

    fn producer(&self) -> MutexGuard<'_, Producer> {
        self.producer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn exchange(&self) -> &Arc<FrameExchange> {
        &self.exchange
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Current resolution epoch
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn set_listener(&self, listener: Option<PublishListener>) {
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = listener;
    }

    pub fn set_transform(&self, transform: Option<Box<dyn FrameTransform>>) {
        self.producer().transform.replace(transform);
    }

    /// Switch between processed and raw preview. While disabled, frames are
    /// ignored without touching any buffer.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Start a new epoch for a session about to stream at `resolution`.
    ///
    /// A frame still in flight from the previous session, or captured before
    /// this call, will be discarded.
    /// Buffers are reallocated only if the resolution differs.
    pub fn prepare(&self, resolution: Resolution) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let started = Instant::now();
        let mut producer = self.producer();
        producer.session_started = Some(started);
        self.reset_producer(&mut producer, resolution, epoch);
        info!(%resolution, epoch, "Pipeline prepared");
    }

    fn reset_producer(&self, producer: &mut Producer, resolution: Resolution, epoch: u64) {
        producer.epoch = epoch;
        if producer.resolution == Some(resolution) {
            return;
        }
        producer.resolution = Some(resolution);
        producer.converted.ensure(resolution);
        producer.spare = Some(self.allocate(resolution, epoch));
    }

    fn allocate(&self, resolution: Resolution, epoch: u64) -> Arc<ProcessedFrame> {
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        debug!(%resolution, epoch, "Allocating processed frame");
        Arc::new(ProcessedFrame::new(resolution, epoch))
    }

    /// Run one raw frame through the pipeline.
    ///
    /// Called from the capture context. Never blocks on the render path
    /// beyond the publication lock.
    pub fn process(&self, frame: &RawFrame) -> FrameOutcome {
        if !self.is_enabled() {
            return FrameOutcome::Disabled;
        }

        let Some(admission) = self.exchange.try_admit() else {
            let busy = self.stats.busy.fetch_add(1, Ordering::Relaxed) + 1;
            if busy % FRAME_LOG_INTERVAL == 1 {
                debug!(sequence = frame.sequence, busy, "Frame dropped, pipeline busy");
            }
            return FrameOutcome::Busy;
        };

        let outcome = self.process_admitted(frame);
        drop(admission);

        match &outcome {
            FrameOutcome::Published => {
                let published = self.stats.published.fetch_add(1, Ordering::Relaxed) + 1;
                if published % FRAME_LOG_INTERVAL == 0 {
                    let stats = self.stats();
                    debug!(
                        published,
                        busy = stats.busy,
                        stale = stats.stale,
                        skipped = stats.skipped,
                        "Pipeline progress"
                    );
                }
                if let Some(listener) = self
                    .listener
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .as_ref()
                {
                    listener();
                }
            }
            FrameOutcome::Stale => {
                self.stats.stale.fetch_add(1, Ordering::Relaxed);
                debug!(sequence = frame.sequence, "Discarded stale frame");
            }
            FrameOutcome::Skipped(error) => {
                let skipped = self.stats.skipped.fetch_add(1, Ordering::Relaxed) + 1;
                if skipped % FRAME_LOG_INTERVAL == 1 {
                    warn!(sequence = frame.sequence, skipped, %error, "Frame skipped");
                }
            }
            FrameOutcome::Busy | FrameOutcome::Disabled => {}
        }

        outcome
    }

    fn process_admitted(&self, frame: &RawFrame) -> FrameOutcome {
        let mut guard = self.producer();
        let producer = &mut *guard;

        // Left over from the session before the last prepare()
        if producer
            .session_started
            .is_some_and(|started| frame.captured_at < started)
        {
            return FrameOutcome::Stale;
        }

        let resolution = frame.resolution();
        if producer.resolution != Some(resolution) {
            let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
            info!(
                old = ?producer.resolution,
                new = %resolution,
                epoch,
                "Frame resolution changed"
            );
            self.reset_producer(producer, resolution, epoch);
        }
        let frame_epoch = producer.epoch;

        if let Err(error) = yuv420_to_nv21(frame, producer.converted.as_mut_slice()) {
            return FrameOutcome::Skipped(error);
        }

        let mut target = match producer.spare.take() {
            Some(spare) if spare.fits(resolution) => spare,
            _ => self.allocate(resolution, frame_epoch),
        };
        // A reader may still hold the buffer we got back from the last publish
        if Arc::get_mut(&mut target).is_none() {
            target = self.allocate(resolution, frame_epoch);
        }
        let Some(output) = Arc::get_mut(&mut target) else {
            return FrameOutcome::Skipped(PipelineError::TransformFailure(
                "output buffer is shared".to_string(),
            ));
        };

        if let Err(error) = producer.transform.run(
            producer.converted.as_slice(),
            frame.width,
            frame.height,
            &mut output.rgba,
        ) {
            producer.spare = Some(target);
            return FrameOutcome::Skipped(error);
        }
        output.epoch = frame_epoch;
        output.sequence = frame.sequence;

        if self.epoch.load(Ordering::Acquire) != frame_epoch {
            producer.spare = Some(target);
            return FrameOutcome::Stale;
        }

        match self.exchange.publish(target) {
            Ok(previous) => {
                producer.spare = previous.filter(|p| p.fits(resolution));
                FrameOutcome::Published
            }
            Err(rejected) => {
                producer.spare = Some(rejected);
                FrameOutcome::Stale
            }
        }
    }
}
