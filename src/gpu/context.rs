//! GPU context management - wgpu device and queue initialization.

use crate::error::SortError;
use wgpu::{Device, Features, Instance, Limits, Queue, RequestAdapterOptions};

pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    /// Initialize GPU context asynchronously.
    ///
    /// Selects the first high-performance adapter and creates a device with
    /// default limits (compute only, no surface).
    pub async fn new() -> Result<Self, SortError> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: {
                #[cfg(target_os = "macos")]
                {
                    wgpu::Backends::METAL
                }
                #[cfg(not(target_os = "macos"))]
                {
                    wgpu::Backends::PRIMARY
                }
            },
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| SortError::GpuInit("no GPU adapter found".to_string()))?;

        let info = adapter.get_info();
        log::info!("GPU: {} ({:?})", info.name, info.backend);
        log::debug!(
            "GPU max storage buffer binding size: {} MB",
            adapter.limits().max_storage_buffer_binding_size / (1024 * 1024)
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Splat Sort Device"),
                    required_features: Features::empty(),
                    required_limits: Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| SortError::GpuInit(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("[wgpu] uncaptured error: {e}");
        }));

        Ok(Self { device, queue })
    }

    /// Synchronous wrapper using pollster.
    pub fn new_blocking() -> Result<Self, SortError> {
        pollster::block_on(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Needs a GPU adapter
    fn test_gpu_context_init() {
        let ctx = GpuContext::new_blocking();
        assert!(ctx.is_ok(), "GPU context initialization failed");
    }
}
