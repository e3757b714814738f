// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture of planar YUV 4:2:0 (YU12)
//!
//! Each memory-mapped buffer holds the three planes back to back. The buffer
//! is copied once per frame, since the driver reuses it as soon as the next
//! frame is dequeued, and the copy is split into plane views.

use super::frame_loop::{LoopAction, LoopController};
use super::types::*;
use super::{CaptureBackend, CaptureSession};
use crate::constants::{DEFAULT_STOP_TIMEOUT, FRAME_LOG_INTERVAL};
use crate::errors::{PipelineError, PipelineResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::framesize::FrameSizeEnum;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Planar 4:2:0 with U before V
const YU12: &[u8; 4] = b"YU12";

/// Sizes offered for devices that report a stepwise frame size range
const STEPWISE_CANDIDATES: [Resolution; 4] = [
    Resolution::new(320, 240),
    Resolution::new(640, 480),
    Resolution::new(1280, 720),
    Resolution::new(1920, 1080),
];

/// Backend for `/dev/video*` nodes
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

/// YU12 resolutions of an open device, in driver order without duplicates
fn yu12_resolutions(dev: &Device) -> Vec<Resolution> {
    let fourcc = FourCC::new(YU12);

    let supports_yu12 = dev
        .enum_formats()
        .map(|formats| formats.iter().any(|f| f.fourcc == fourcc))
        .unwrap_or(false);
    if !supports_yu12 {
        return Vec::new();
    }

    let mut resolutions: Vec<Resolution> = Vec::new();
    for size in dev.enum_framesizes(fourcc).unwrap_or_default() {
        match size.size {
            FrameSizeEnum::Discrete(d) => resolutions.push(Resolution::new(d.width, d.height)),
            FrameSizeEnum::Stepwise(s) => {
                resolutions.extend(STEPWISE_CANDIDATES.iter().copied().filter(|r| {
                    r.width >= s.min_width
                        && r.width <= s.max_width
                        && r.height >= s.min_height
                        && r.height <= s.max_height
                        && (r.width - s.min_width) % s.step_width.max(1) == 0
                        && (r.height - s.min_height) % s.step_height.max(1) == 0
                }));
                resolutions.push(Resolution::new(s.max_width, s.max_height));
            }
        }
    }

    let mut unique = Vec::with_capacity(resolutions.len());
    for r in resolutions {
        if !unique.contains(&r) {
            unique.push(r);
        }
    }
    unique
}

fn open_device(device: &CaptureDevice) -> PipelineResult<Device> {
    Device::with_path(&device.id).map_err(|e| {
        PipelineError::DeviceUnavailable(format!("failed to open {}: {}", device.id, e))
    })
}

impl CaptureBackend for V4l2Backend {
    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        !v4l::context::enum_devices().is_empty()
    }

    fn enumerate_devices(&self) -> Vec<CaptureDevice> {
        let mut devices = Vec::new();

        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();
            let Ok(dev) = Device::with_path(node.path()) else {
                debug!(path = %path, "Skipping unopenable V4L2 node");
                continue;
            };

            let resolutions = yu12_resolutions(&dev);
            if resolutions.is_empty() {
                debug!(path = %path, "Skipping V4L2 node without YU12 support");
                continue;
            }

            let name = dev
                .query_caps()
                .map(|caps| caps.card)
                .ok()
                .or_else(|| node.name())
                .unwrap_or_else(|| path.clone());

            devices.push(CaptureDevice {
                id: path,
                name,
                facing: Facing::External,
                resolutions,
            });
        }

        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    fn supported_resolutions(&self, device: &CaptureDevice) -> PipelineResult<Vec<Resolution>> {
        let dev = open_device(device)?;
        Ok(yu12_resolutions(&dev))
    }

    fn open(
        &self,
        device: &CaptureDevice,
        resolution: Resolution,
        targets: CaptureTargets,
    ) -> PipelineResult<Box<dyn CaptureSession>> {
        let dev = open_device(device)?;

        let fourcc = FourCC::new(YU12);
        let requested = Format::new(resolution.width, resolution.height, fourcc);
        let format = dev.set_format(&requested).map_err(|e| {
            PipelineError::ConfigurationUnavailable(format!("set_format failed: {}", e))
        })?;

        if format.fourcc != fourcc
            || format.width != resolution.width
            || format.height != resolution.height
        {
            return Err(PipelineError::ConfigurationUnavailable(format!(
                "{} negotiated {}x{} {}, wanted {} YU12",
                device.name, format.width, format.height, format.fourcc, resolution
            )));
        }

        info!(
            device = %device.name,
            width = format.width,
            height = format.height,
            stride = format.stride,
            "V4L2 YU12 format configured"
        );

        let layout = PlaneLayout::yu12(resolution, format.stride as usize);
        let name = device.name.clone();

        let worker = LoopController::start_with_init(
            "v4l2-capture",
            move || {
                let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, 4)
                    .map_err(|e| format!("Failed to create buffer stream: {}", e))?;
                info!(device = %name, "V4L2 capture stream started");
                Ok(stream)
            },
            move |stream| match stream.next() {
                Ok((buf, meta)) => {
                    let sequence = u64::from(meta.sequence);
                    let Some(frame) = layout.frame(buf, sequence) else {
                        if sequence % FRAME_LOG_INTERVAL == 0 {
                            warn!(
                                got = buf.len(),
                                expected = layout.total_len(),
                                "Short V4L2 buffer"
                            );
                        }
                        return LoopAction::Continue;
                    };
                    targets.preview.present(&frame);
                    if targets.acquisition.push(frame) {
                        LoopAction::Continue
                    } else {
                        LoopAction::Stop
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to dequeue V4L2 buffer");
                    std::thread::sleep(Duration::from_millis(10));
                    LoopAction::Continue
                }
            },
        );

        Ok(Box::new(V4l2Session {
            device: device.clone(),
            resolution,
            worker: Some(worker),
        }))
    }
}

/// Byte layout of a contiguous YU12 buffer
#[derive(Debug, Clone, Copy)]
struct PlaneLayout {
    resolution: Resolution,
    luma_stride: usize,
    chroma_stride: usize,
}

impl PlaneLayout {
    fn yu12(resolution: Resolution, stride: usize) -> Self {
        let luma_stride = stride.max(resolution.width as usize);
        Self {
            resolution,
            luma_stride,
            chroma_stride: luma_stride / 2,
        }
    }

    fn luma_len(&self) -> usize {
        self.luma_stride * self.resolution.height as usize
    }

    fn chroma_len(&self) -> usize {
        self.chroma_stride * (self.resolution.height as usize / 2)
    }

    fn total_len(&self) -> usize {
        self.luma_len() + 2 * self.chroma_len()
    }

    /// Copy `buf` and split it into Y, U, V views
    fn frame(&self, buf: &[u8], sequence: u64) -> Option<RawFrame> {
        let total = self.total_len();
        if buf.len() < total {
            return None;
        }
        let data: Arc<[u8]> = Arc::from(&buf[..total]);
        let u_offset = self.luma_len();
        let v_offset = u_offset + self.chroma_len();

        Some(RawFrame {
            width: self.resolution.width,
            height: self.resolution.height,
            format: RawFormat::Yuv420,
            planes: vec![
                Plane::new(Arc::clone(&data), self.luma_stride, 1),
                Plane::with_offset(Arc::clone(&data), u_offset, self.chroma_stride, 1),
                Plane::with_offset(data, v_offset, self.chroma_stride, 1),
            ],
            sequence,
            captured_at: Instant::now(),
        })
    }
}

struct V4l2Session {
    device: CaptureDevice,
    resolution: Resolution,
    worker: Option<LoopController>,
}

impl CaptureSession for V4l2Session {
    fn device(&self) -> &CaptureDevice {
        &self.device
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            info!(device = %self.device.name, "Closing V4L2 device");
            // A wedged driver can block in dequeue; don't hang the caller on it
            worker.stop_with_timeout(DEFAULT_STOP_TIMEOUT);
        }
    }
}

impl Drop for V4l2Session {
    fn drop(&mut self) {
        self.close();
    }
}
