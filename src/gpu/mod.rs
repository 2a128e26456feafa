// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization for frame presentation
//!
//! The presenter renders with its own wgpu device. Embedders that present to
//! a window create the surface from [`create_instance`] first and pass it as
//! the compatible surface so the adapter can present to it.

use crate::errors::PresentError;
use std::sync::Arc;
use tracing::info;

pub use wgpu;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
}

/// Device, queue and adapter information for the render thread
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
}

/// wgpu instance restricted to the backends this crate is built with
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        ..Default::default()
    })
}

/// Create a device and queue for rendering
///
/// # Arguments
///
/// * `instance` - The instance any presentation surface was created from
/// * `label` - A label for the device (for debugging)
/// * `compatible_surface` - Surface the adapter must be able to present to
pub async fn create_device(
    instance: &wgpu::Instance,
    label: &str,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<GpuContext, PresentError> {
    info!(label = label, "Creating GPU device for presentation");

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| PresentError::GpuInit(format!("no suitable GPU adapter: {}", e)))?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            ..Default::default()
        })
        .await
        .map_err(|e| PresentError::GpuInit(format!("failed to create GPU device: {}", e)))?;

    Ok(GpuContext {
        device: Arc::new(device),
        queue: Arc::new(queue),
        info: GpuDeviceInfo {
            adapter_name: adapter_info.name,
            backend: adapter_info.backend,
        },
    })
}

/// Blocking variant of [`create_device`] without a surface, for headless rendering
pub fn create_headless_device(label: &str) -> Result<GpuContext, PresentError> {
    let instance = create_instance();
    pollster::block_on(create_device(&instance, label, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_headless_device() {
        // This test requires a GPU, so it may be skipped in CI
        match create_headless_device("test_device") {
            Ok(context) => {
                assert_eq!(context.info.backend, wgpu::Backend::Vulkan);
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }
}
