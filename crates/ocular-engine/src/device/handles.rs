/// Access to the device objects a render target is created against.
///
/// Implemented by both the window-bound [`Gpu`](super::Gpu) and
/// [`HeadlessGpu`](super::HeadlessGpu), so targets can be built in either setting.
pub trait GpuHandles {
    fn adapter(&self) -> &wgpu::Adapter;
    fn device(&self) -> &wgpu::Device;
    fn queue(&self) -> &wgpu::Queue;

    fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter().get_info()
    }

    /// Capabilities below full WebGPU (GL and older native backends lack some).
    fn downlevel_flags(&self) -> wgpu::DownlevelFlags {
        self.adapter().get_downlevel_capabilities().flags
    }

    fn format_features(&self, format: wgpu::TextureFormat) -> wgpu::TextureFormatFeatures {
        self.adapter().get_texture_format_features(format)
    }
}
