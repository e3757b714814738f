// SPDX-License-Identifier: GPL-3.0-only

//! Draw targets for the preview renderer

use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::{self, GpuContext, wgpu};
use crate::media::buffers::Snapshot;
use tracing::debug;

/// Something the preview can be drawn onto.
///
/// A windowing host implements this over its swapchain; [`OffscreenSurface`]
/// covers headless runs.
pub trait DisplaySurface: Send {
    /// Size in pixels
    fn size(&self) -> (u32, u32);

    /// Colour format of the views returned by [`begin_frame`](Self::begin_frame)
    fn format(&self) -> wgpu::TextureFormat;

    /// View to draw the next frame into
    ///
    /// # Errors
    /// `SurfaceUnavailable` if the surface cannot currently be drawn on
    fn begin_frame(&mut self) -> PipelineResult<wgpu::TextureView>;

    /// Present what was drawn since `begin_frame`
    fn end_frame(&mut self) {}

    /// Pixels of the last drawn frame, if this surface can read them back
    fn read_pixels(&self, _gpu: &GpuContext) -> PipelineResult<Option<Snapshot>> {
        Ok(None)
    }
}

/// Texture-backed surface with CPU readback
pub struct OffscreenSurface {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

impl OffscreenSurface {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        debug!(width, height, "Creating offscreen surface");
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_surface_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self {
            texture,
            width,
            height,
        }
    }
}

/// Bytes per row of a texture copy, padded to the copy alignment
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Drop the row padding of a texture copy
pub fn strip_row_padding(padded: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row = (width * 4) as usize;
    let stride = padded_bytes_per_row(width) as usize;
    let mut rgba = Vec::with_capacity(row * height as usize);
    for line in padded.chunks(stride).take(height as usize) {
        rgba.extend_from_slice(&line[..row.min(line.len())]);
    }
    rgba
}

impl DisplaySurface for OffscreenSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> wgpu::TextureFormat {
        Self::FORMAT
    }

    fn begin_frame(&mut self) -> PipelineResult<wgpu::TextureView> {
        Ok(self
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn read_pixels(&self, gpu: &GpuContext) -> PipelineResult<Option<Snapshot>> {
        let bytes_per_row = padded_bytes_per_row(self.width);
        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen_readback_buffer"),
            size: u64::from(bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let padded = pollster::block_on(gpu::read_buffer_async(&gpu.device, &staging))?;
        if padded.len() < bytes_per_row as usize * self.height as usize {
            return Err(PipelineError::GpuProgramFailure(
                "readback buffer shorter than the surface".into(),
            ));
        }

        Ok(Some(Snapshot {
            width: self.width,
            height: self.height,
            rgba: strip_row_padding(&padded, self.width, self.height),
        }))
    }
}
