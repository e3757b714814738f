// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities for the render pipeline.
//!
//! Creates a Vulkan wgpu device and queue without a window surface; the
//! preview is drawn into textures owned by a [`DisplaySurface`](crate::render::DisplaySurface).

use crate::errors::{PipelineError, PipelineResult};
use std::sync::Arc;
use tracing::{debug, info};

pub use wgpu;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used
    pub backend: wgpu::Backend,
    /// Whether the adapter is a software rasterizer
    pub software: bool,
}

/// Device, queue and adapter description, shared by everything drawing on it
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
}

/// Create a wgpu device and queue for rendering.
///
/// # Arguments
///
/// * `label` - A label for the device (for debugging)
///
/// # Errors
///
/// `GpuUnavailable` when no adapter or device can be obtained.
pub async fn create_render_device(label: &str) -> PipelineResult<GpuContext> {
    info!(label = label, "Creating GPU device for rendering");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| PipelineError::GpuUnavailable(format!("no suitable adapter: {}", e)))?;

    let adapter_info = adapter.get_info();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        device_type = ?adapter_info.device_type,
        "GPU adapter selected for rendering"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| PipelineError::GpuUnavailable(format!("failed to create device: {}", e)))?;

    debug!("GPU device and queue created");

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        software: adapter_info.device_type == wgpu::DeviceType::Cpu,
    };

    Ok(GpuContext {
        device: Arc::new(device),
        queue: Arc::new(queue),
        info,
    })
}

/// Blocking wrapper around [`create_render_device`]
pub fn create_render_device_blocking(label: &str) -> PipelineResult<GpuContext> {
    pollster::block_on(create_render_device(label))
}

/// Helper for async buffer readback (map, poll, read, unmap)
///
/// `buffer` must have been created with `MAP_READ`.
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> PipelineResult<Vec<u8>> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    receiver
        .await
        .map_err(|_| PipelineError::GpuProgramFailure("buffer mapping was dropped".into()))?
        .map_err(|e| PipelineError::GpuProgramFailure(format!("failed to map buffer: {:?}", e)))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}
