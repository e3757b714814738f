// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture devices
//!
//! Produces a moving test pattern at a fixed rate, laid out like real camera
//! hardware: padded luma rows and either planar or interleaved chroma. Always
//! available, so the whole pipeline can run without a camera attached.

use super::frame_loop::{LoopAction, LoopController};
use super::types::*;
use super::{CaptureBackend, CaptureSession, find_device};
use crate::constants::{DEFAULT_SYNTHETIC_FPS, FRAME_LOG_INTERVAL};
use crate::errors::{PipelineError, PipelineResult};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How chroma is laid out in generated frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaLayout {
    /// Separate U and V planes, pixel stride 1
    Planar,
    /// One interleaved U,V plane exposed as two views, pixel stride 2
    #[default]
    SemiPlanar,
}

/// Backend serving generated frames
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    devices: Vec<CaptureDevice>,
    fps: u32,
    layout: ChromaLayout,
    row_padding: usize,
}

impl SyntheticBackend {
    /// Back and front devices with a few common resolutions
    pub fn new(fps: u32) -> Self {
        let devices = vec![
            CaptureDevice {
                id: "synthetic:0".to_string(),
                name: "Synthetic Back Camera".to_string(),
                facing: Facing::Back,
                resolutions: vec![
                    Resolution::new(320, 240),
                    Resolution::new(640, 480),
                    Resolution::new(1280, 720),
                ],
            },
            CaptureDevice {
                id: "synthetic:1".to_string(),
                name: "Synthetic Front Camera".to_string(),
                facing: Facing::Front,
                resolutions: vec![Resolution::new(640, 480), Resolution::new(1280, 720)],
            },
        ];
        Self::with_devices(devices, fps)
    }

    pub fn with_devices(devices: Vec<CaptureDevice>, fps: u32) -> Self {
        Self {
            devices,
            fps: fps.max(1),
            layout: ChromaLayout::default(),
            row_padding: 16,
        }
    }

    pub fn with_layout(mut self, layout: ChromaLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_row_padding(mut self, padding: usize) -> Self {
        self.row_padding = padding;
        self
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTHETIC_FPS)
    }
}

impl CaptureBackend for SyntheticBackend {
    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::Synthetic
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate_devices(&self) -> Vec<CaptureDevice> {
        self.devices.clone()
    }

    fn supported_resolutions(&self, device: &CaptureDevice) -> PipelineResult<Vec<Resolution>> {
        Ok(find_device(self, device)?.resolutions)
    }

    fn open(
        &self,
        device: &CaptureDevice,
        resolution: Resolution,
        targets: CaptureTargets,
    ) -> PipelineResult<Box<dyn CaptureSession>> {
        let device = find_device(self, device)?;
        if !device.resolutions.contains(&resolution) {
            return Err(PipelineError::ConfigurationUnavailable(format!(
                "{} does not support {}",
                device.name, resolution
            )));
        }

        info!(device = %device.name, %resolution, fps = self.fps, "Opening synthetic device");

        let mut generator = PatternGenerator {
            resolution,
            layout: self.layout,
            row_padding: self.row_padding,
            sequence: 0,
        };
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.fps));
        let mut next_due = Instant::now();

        let worker = LoopController::start("synthetic-capture", move || {
            let now = Instant::now();
            if now < next_due {
                thread::sleep((next_due - now).min(interval));
                return LoopAction::Continue;
            }
            next_due += interval;
            if next_due < now {
                // Fell behind; don't burst to catch up
                next_due = now + interval;
            }

            let frame = generator.next_frame();
            if frame.sequence % FRAME_LOG_INTERVAL == 0 {
                debug!(sequence = frame.sequence, "Synthetic frame");
            }
            targets.preview.present(&frame);
            if targets.acquisition.push(frame) {
                LoopAction::Continue
            } else {
                LoopAction::Stop
            }
        });

        Ok(Box::new(SyntheticSession {
            device,
            resolution,
            worker: Some(worker),
        }))
    }
}

struct SyntheticSession {
    device: CaptureDevice,
    resolution: Resolution,
    worker: Option<LoopController>,
}

impl CaptureSession for SyntheticSession {
    fn device(&self) -> &CaptureDevice {
        &self.device
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            info!(device = %self.device.name, "Closing synthetic device");
            worker.stop();
        }
    }
}

impl Drop for SyntheticSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Diagonal luma ramp drifting one step per frame over a slow chroma sweep
struct PatternGenerator {
    resolution: Resolution,
    layout: ChromaLayout,
    row_padding: usize,
    sequence: u64,
}

impl PatternGenerator {
    fn next_frame(&mut self) -> RawFrame {
        let w = self.resolution.width as usize;
        let h = self.resolution.height as usize;
        let t = self.sequence as usize;

        let y_stride = w + self.row_padding;
        let mut y = vec![0u8; y_stride * h];
        for (row, line) in y.chunks_exact_mut(y_stride).enumerate() {
            for (col, px) in line[..w].iter_mut().enumerate() {
                // Hard band every 64 pixels so edge transforms have something to find
                let band = if (col + t * 2) % 64 < 32 { 0 } else { 96 };
                *px = ((col + row) / 8 % 128 + band) as u8;
            }
        }

        let (cw, ch) = (w / 2, h / 2);
        let u_value = (64 + t % 128) as u8;
        let v_value = (192 - t % 128) as u8;

        let planes = match self.layout {
            ChromaLayout::Planar => {
                let stride = cw + self.row_padding / 2;
                let mut u = vec![0u8; stride * ch];
                let mut v = vec![0u8; stride * ch];
                for row in 0..ch {
                    u[row * stride..row * stride + cw].fill(u_value);
                    v[row * stride..row * stride + cw].fill(v_value);
                }
                vec![
                    Plane::new(Arc::from(y), y_stride, 1),
                    Plane::new(Arc::from(u), stride, 1),
                    Plane::new(Arc::from(v), stride, 1),
                ]
            }
            ChromaLayout::SemiPlanar => {
                let stride = cw * 2 + self.row_padding;
                let mut uv = vec![0u8; stride * ch];
                for line in uv.chunks_exact_mut(stride) {
                    for pair in line[..cw * 2].chunks_exact_mut(2) {
                        pair[0] = u_value;
                        pair[1] = v_value;
                    }
                }
                let uv: Arc<[u8]> = Arc::from(uv);
                vec![
                    Plane::new(Arc::from(y), y_stride, 1),
                    Plane::with_offset(Arc::clone(&uv), 0, stride, 2),
                    Plane::with_offset(uv, 1, stride, 2),
                ]
            }
        };

        self.sequence += 1;
        RawFrame {
            width: self.resolution.width,
            height: self.resolution.height,
            format: RawFormat::Yuv420,
            planes,
            sequence: self.sequence,
            captured_at: Instant::now(),
        }
    }
}
