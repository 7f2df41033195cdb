use anyhow::{Context, Result};

/// Initialization parameters for the GPU layer.
///
/// Shared by the windowed [`Gpu`](super::Gpu) and [`HeadlessGpu`](super::HeadlessGpu).
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// Ignored by [`HeadlessGpu`](super::HeadlessGpu), which has no surface.
    pub prefer_srgb: bool,

    /// Swap behavior of the surface.
    pub present_mode: wgpu::PresentMode,

    /// Preferred alpha mode; replaced by a supported one if the surface lacks it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Adapter selection preference.
    pub power_preference: wgpu::PowerPreference,

    /// Force a software adapter (useful for CI machines without a GPU).
    pub force_fallback_adapter: bool,

    /// Extra device features. Render targets need none.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Downlevel capabilities an adapter must report to be accepted.
    ///
    /// Render targets need none; they avoid depth copies and view formats.
    pub required_downlevel_flags: wgpu::DownlevelFlags,

    /// Frame latency hint for the surface.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            required_downlevel_flags: wgpu::DownlevelFlags::empty(),
            desired_maximum_frame_latency: 2,
        }
    }
}

/// Instance over every backend wgpu was built with.
pub(super) fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Adapter honoring `init`'s power preference, compatible with `surface` if given.
pub(super) async fn request_adapter(
    instance: &wgpu::Instance,
    init: &GpuInit,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            compatible_surface: surface,
            force_fallback_adapter: init.force_fallback_adapter,
        })
        .await
        .context("failed to find a suitable GPU adapter")?;

    let info = adapter.get_info();
    let downlevel = adapter.get_downlevel_capabilities();
    log::debug!(
        "adapter {} ({:?}): shader model {:?}, downlevel {:?}",
        info.name,
        info.backend,
        downlevel.shader_model,
        downlevel.flags
    );

    let missing = missing_downlevel(downlevel.flags, init.required_downlevel_flags);
    anyhow::ensure!(
        missing.is_empty(),
        "adapter {} lacks required downlevel capabilities {missing:?}",
        info.name
    );

    Ok(adapter)
}

fn missing_downlevel(have: wgpu::DownlevelFlags, want: wgpu::DownlevelFlags) -> wgpu::DownlevelFlags {
    want - have
}

/// Opens the logical device and queue with `init`'s features and limits.
pub(super) async fn request_device(
    adapter: &wgpu::Adapter,
    init: &GpuInit,
    label: &str,
) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: init.required_features,
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")
}
