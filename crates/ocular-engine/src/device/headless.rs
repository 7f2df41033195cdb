use anyhow::Result;

use super::init::{create_instance, request_adapter, request_device};
use super::{GpuHandles, GpuInit};

/// GPU context without a surface.
///
/// Used for offscreen rendering where results are only ever read back, and by
/// the integration tests. Surface-related fields of [`GpuInit`] are ignored.
pub struct HeadlessGpu {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl HeadlessGpu {
    /// Acquires an adapter and device with no compatible surface requirement.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, &init, None).await?;
        let (device, queue) = request_device(&adapter, &init, "ocular headless device").await?;

        log::debug!("headless gpu ready: adapter={:?}", adapter.get_info().name);

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`HeadlessGpu::new`].
    pub fn new_blocking(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }
}

impl GpuHandles for HeadlessGpu {
    fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
