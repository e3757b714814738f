// SPDX-License-Identifier: GPL-3.0-only

//! Frame-sized buffers reused across frames of one resolution

use crate::backends::camera::types::Resolution;
use tracing::debug;

/// NV21 staging buffer written by the converter and read by the transform
#[derive(Debug, Default)]
pub struct ConvertedBuffer {
    resolution: Option<Resolution>,
    data: Vec<u8>,
}

impl ConvertedBuffer {
    pub fn new(resolution: Resolution) -> Self {
        let mut buffer = Self::default();
        buffer.ensure(resolution);
        buffer
    }

    /// Resize for `resolution`. Returns true if the storage was reallocated.
    pub fn ensure(&mut self, resolution: Resolution) -> bool {
        if self.resolution == Some(resolution) {
            return false;
        }
        let len = resolution.nv21_len();
        debug!(%resolution, len, "Allocating NV21 buffer");
        // Replace rather than resize so capacity tracks the current resolution
        self.data = vec![0; len];
        self.resolution = Some(resolution);
        true
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// RGBA8 output of the transform, published to the render path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFrame {
    pub width: u32,
    pub height: u32,
    /// Resolution epoch this frame was produced in
    pub epoch: u64,
    /// Hardware sequence number of the source frame
    pub sequence: u64,
    pub rgba: Vec<u8>,
}

impl ProcessedFrame {
    pub fn new(resolution: Resolution, epoch: u64) -> Self {
        Self {
            width: resolution.width,
            height: resolution.height,
            epoch,
            sequence: 0,
            rgba: vec![0; resolution.rgba_len()],
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Whether this buffer can hold a frame of `resolution` without reallocating
    pub fn fits(&self, resolution: Resolution) -> bool {
        self.resolution() == resolution && self.rgba.len() == resolution.rgba_len()
    }
}

/// Immutable copy of a published frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Snapshot {
    pub fn from_frame(frame: &ProcessedFrame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            rgba: frame.rgba.clone(),
        }
    }

    /// Convert into an `image` buffer for encoding
    pub fn into_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba)
    }
}
