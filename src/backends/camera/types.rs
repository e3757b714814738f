// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture backend abstraction

//! Shared types for capture backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use super::queue::FrameQueue;

/// Capture backend type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackendType {
    /// Generated test pattern, always available
    #[default]
    Synthetic,
    /// Video4Linux2 capture devices (Linux only)
    V4l2,
}

impl std::fmt::Display for CaptureBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureBackendType::Synthetic => write!(f, "synthetic"),
            CaptureBackendType::V4l2 => write!(f, "V4L2"),
        }
    }
}

/// Direction a capture device is facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
    /// USB webcams and other devices with no fixed orientation
    External,
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
            Facing::External => write!(f, "external"),
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of an NV21 frame at this resolution (luma + interleaved VU)
    pub fn nv21_len(&self) -> usize {
        self.width as usize * self.height as usize * 3 / 2
    }

    /// Byte length of an RGBA8 frame at this resolution
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Manhattan distance between two resolutions
    pub fn distance(&self, other: &Resolution) -> u64 {
        u64::from(self.width.abs_diff(other.width)) + u64::from(self.height.abs_diff(other.height))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid width '{}': {}", w, e))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid height '{}': {}", h, e))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution must be non-zero, got '{}'", s));
        }
        Ok(Self { width, height })
    }
}

/// Pick the candidate closest to `target` by `|dw| + |dh|`.
///
/// Ties go to the earliest candidate in the list. Returns `None` for an
/// empty list.
pub fn select_resolution(candidates: &[Resolution], target: Resolution) -> Option<Resolution> {
    // min_by_key keeps the first of several equal minima
    candidates.iter().copied().min_by_key(|r| r.distance(&target))
}

/// A capture device as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Backend-specific identifier (device path for V4L2)
    pub id: String,
    /// Human readable name
    pub name: String,
    pub facing: Facing,
    /// Output resolutions in backend order
    pub resolutions: Vec<Resolution>,
}

/// Device used when nothing has been selected yet: the first back-facing
/// device, otherwise the first enumerated one.
pub fn default_device(devices: &[CaptureDevice]) -> Option<&CaptureDevice> {
    devices
        .iter()
        .find(|d| d.facing == Facing::Back)
        .or_else(|| devices.first())
}

/// Device to switch to from `current`.
///
/// Back goes to front and front goes to back, staying put when the opposite
/// side does not exist. Any other device prefers front, then back. Without a
/// current device this is [`default_device`].
pub fn next_device<'a>(
    devices: &'a [CaptureDevice],
    current: Option<&CaptureDevice>,
) -> Option<&'a CaptureDevice> {
    let Some(current) = current else {
        return default_device(devices);
    };

    let find = |facing: Facing| devices.iter().find(|d| d.facing == facing);
    let same = || devices.iter().find(|d| d.id == current.id);

    match current.facing {
        Facing::Back => find(Facing::Front).or_else(same),
        Facing::Front => find(Facing::Back).or_else(same),
        Facing::External => find(Facing::Front).or_else(|| find(Facing::Back)).or_else(same),
    }
    .or_else(|| default_device(devices))
}

/// Pixel layout of a raw frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFormat {
    /// Three-plane 4:2:0 (Y, U, V) with per-plane strides
    Yuv420,
    /// Anything else, identified by its FourCC or name
    Other(String),
}

/// One plane of a raw frame.
///
/// Planes may share storage: semi-planar sources expose U and V as two views
/// of the same interleaved buffer, offset by one byte with a pixel stride of 2.
#[derive(Debug, Clone)]
pub struct Plane {
    data: Arc<[u8]>,
    offset: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Arc<[u8]>, row_stride: usize, pixel_stride: usize) -> Self {
        Self::with_offset(data, 0, row_stride, pixel_stride)
    }

    /// View into shared storage starting at `offset`
    pub fn with_offset(
        data: Arc<[u8]>,
        offset: usize,
        row_stride: usize,
        pixel_stride: usize,
    ) -> Self {
        Self {
            data,
            offset,
            row_stride,
            pixel_stride,
        }
    }

    /// Plane bytes, starting at the first sample
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.data.get(self.offset..).unwrap_or(&[])
    }
}

/// A frame handed over by the capture hardware.
///
/// Valid for one acquisition callback only; consumers copy what they need
/// and drop it.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: RawFormat,
    /// Y, U, V in that order for [`RawFormat::Yuv420`]
    pub planes: Vec<Plane>,
    /// Hardware sequence number, monotonic per session
    pub sequence: u64,
    pub captured_at: Instant,
}

impl RawFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Callback receiving every raw frame presented to a preview surface
pub type PreviewSink = Box<dyn Fn(&RawFrame) + Send + Sync>;

/// Host-owned live preview target.
///
/// The host decides when it is ready (e.g. once its window exists); capture
/// sessions refuse to start against a surface that is not.
pub struct PreviewSurface {
    ready: AtomicBool,
    presented: AtomicU64,
    sink: Mutex<Option<PreviewSink>>,
}

impl PreviewSurface {
    /// A surface that is not ready yet
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            presented: AtomicU64::new(0),
            sink: Mutex::new(None),
        }
    }

    /// A surface that is ready immediately
    pub fn ready() -> Arc<Self> {
        let surface = Self::new();
        surface.set_ready(true);
        Arc::new(surface)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_sink(&self, sink: Option<PreviewSink>) {
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = sink;
    }

    /// Deliver a frame to the preview target
    pub fn present(&self, frame: &RawFrame) {
        if !self.is_ready() {
            return;
        }
        self.presented.fetch_add(1, Ordering::Relaxed);
        if let Some(sink) = self.sink.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            sink(frame);
        }
    }

    /// Number of frames presented so far
    pub fn frames_presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }
}

impl Default for PreviewSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PreviewSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSurface")
            .field("ready", &self.is_ready())
            .field("presented", &self.frames_presented())
            .finish()
    }
}

/// Both targets of the repeating capture request
#[derive(Clone)]
pub struct CaptureTargets {
    pub preview: Arc<PreviewSurface>,
    /// Internal acquisition queue drained by the capture loop
    pub acquisition: Arc<FrameQueue>,
}
