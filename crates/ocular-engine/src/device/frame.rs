/// Represents a single acquired frame.
///
/// This object is short-lived and must be finalized promptly. Holding the surface
/// texture prevents acquisition of subsequent frames.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl GpuFrame {
    /// Borrows the frame as a presentation destination for a blit.
    pub fn target(&mut self, format: wgpu::TextureFormat) -> FrameTarget<'_> {
        FrameTarget::new(&mut self.encoder, &self.view, format)
    }
}

/// Destination of a presentation blit (encoder + color view + view format).
///
/// Commands are recorded into `encoder`; submission stays with the owner of the
/// encoder, typically [`Gpu::submit`](super::Gpu::submit).
pub struct FrameTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl<'a> FrameTarget<'a> {
    #[inline]
    pub fn new(
        encoder: &'a mut wgpu::CommandEncoder,
        view: &'a wgpu::TextureView,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self { encoder, view, format }
    }
}
