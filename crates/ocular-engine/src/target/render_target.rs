use crate::device::{FrameTarget, GpuHandles};

#[cfg(feature = "triangle-id")]
use super::attachment::Attachment;
use super::attachment::{Attachments, DEPTH_BITS_FORMAT, DEPTH_FORMAT, ID_FORMAT};
use super::blit::Blitter;
use super::depth::{DepthPath, DepthUnprojection, DepthUnprojector, RawDepthPass};
use super::format::{self, ImageViewMut};
use super::readback::read_attachment;
#[cfg(feature = "triangle-id")]
use super::TriangleShader;
use super::{RenderSession, Size, TargetError};

/// Construction-time options that are not capabilities.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Color attachment format: `Rgba8Unorm` or `Rgba8UnormSrgb`.
    pub color_format: wgpu::TextureFormat,
    /// Prefix for log lines and GPU object labels.
    pub label: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            label: "render target".to_string(),
        }
    }
}

/// Externally owned shaders a render target borrows.
///
/// Absence is meaningful: without a depth unprojector, depth is unprojected on
/// the host; without a triangle shader, no triangle-id attachment exists.
#[derive(Default, Clone, Copy)]
pub struct TargetShaders<'s> {
    pub depth: Option<&'s dyn DepthUnprojector>,
    #[cfg(feature = "triangle-id")]
    pub triangle: Option<&'s dyn TriangleShader>,
}

impl<'s> TargetShaders<'s> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn depth(mut self, shader: &'s dyn DepthUnprojector) -> Self {
        self.depth = Some(shader);
        self
    }

    #[cfg(feature = "triangle-id")]
    pub fn triangle(mut self, shader: &'s dyn TriangleShader) -> Self {
        self.triangle = Some(shader);
        self
    }
}

/// Optional operations available on a particular target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Depth is unprojected on the device (required by `read_frame_depth_gpu`).
    pub gpu_depth_unprojection: bool,
    /// A triangle-id attachment exists.
    pub triangle_ids: bool,
    /// Device-to-device export was compiled in.
    pub device_export: bool,
}

/// Offscreen framebuffer with color, depth, object-id and optional triangle-id planes.
///
/// Draw into it between [`render_enter`](Self::render_enter) and
/// [`RenderSession::render_exit`], then read channels back to host memory, to
/// device buffers (feature `device-export`), or blit color on screen.
///
/// The target owns its attachments and is move-only. Shaders are borrowed for
/// `'s`. It is not meant to be shared between threads.
pub struct RenderTarget<'s> {
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    pub(super) size: Size,
    pub(super) unprojection: DepthUnprojection,
    pub(super) depth_path: DepthPath<'s>,
    #[cfg(feature = "triangle-id")]
    pub(super) triangle_shader: Option<&'s dyn TriangleShader>,
    pub(super) attachments: Attachments,
    raw_depth: RawDepthPass,
    #[cfg(feature = "device-export")]
    pub(super) export_scratch: Option<wgpu::Buffer>,
    blitter: Blitter,
    device_id: u32,
    label: String,
}

impl<'s> RenderTarget<'s> {
    /// Target with host-side depth unprojection and no triangle ids.
    pub fn new(
        gpu: &impl GpuHandles,
        size: Size,
        unprojection: DepthUnprojection,
    ) -> Result<Self, TargetError> {
        Self::with_config(gpu, size, unprojection, TargetShaders::none(), TargetConfig::default())
    }

    pub fn with_shaders(
        gpu: &impl GpuHandles,
        size: Size,
        unprojection: DepthUnprojection,
        shaders: TargetShaders<'s>,
    ) -> Result<Self, TargetError> {
        Self::with_config(gpu, size, unprojection, shaders, TargetConfig::default())
    }

    /// Creates every attachment up front; fails instead of returning a partial target.
    pub fn with_config(
        gpu: &impl GpuHandles,
        size: Size,
        unprojection: DepthUnprojection,
        shaders: TargetShaders<'s>,
        config: TargetConfig,
    ) -> Result<Self, TargetError> {
        let device = gpu.device().clone();
        let queue = gpu.queue().clone();

        size.validate(device.limits().max_texture_dimension_2d)?;
        if !matches!(
            config.color_format,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
        ) {
            return Err(TargetError::configuration(format!(
                "color attachment must be RGBA8, got {:?}",
                config.color_format
            )));
        }

        check_renderable(gpu, config.color_format)?;

        #[cfg(feature = "triangle-id")]
        let with_triangle_ids = shaders.triangle.is_some();
        #[cfg(not(feature = "triangle-id"))]
        let with_triangle_ids = false;

        let attachments = Attachments::create(&device, size, config.color_format, with_triangle_ids)?;
        let raw_depth = RawDepthPass::new(&device)?;
        let depth_path = DepthPath::from_option(shaders.depth);

        let info = gpu.adapter_info();
        log::debug!(
            "{}: created {size} color={:?} gpu_depth={} triangle_ids={} on {} ({:?}, downlevel {:?})",
            config.label,
            config.color_format,
            matches!(depth_path, DepthPath::Gpu(_)),
            with_triangle_ids,
            info.name,
            info.backend,
            gpu.downlevel_flags()
        );

        Ok(Self {
            device,
            queue,
            size,
            unprojection,
            depth_path,
            #[cfg(feature = "triangle-id")]
            triangle_shader: shaders.triangle,
            attachments,
            raw_depth,
            #[cfg(feature = "device-export")]
            export_scratch: None,
            blitter: Blitter::default(),
            device_id: info.device,
            label: config.label,
        })
    }

    /// The fixed framebuffer size.
    #[inline]
    pub fn framebuffer_size(&self) -> Size {
        self.size
    }

    #[inline]
    pub fn depth_unprojection(&self) -> DepthUnprojection {
        self.unprojection
    }

    /// Device id of the adapter the target's resources live on.
    #[inline]
    pub fn gpu_device_id(&self) -> u32 {
        self.device_id
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            gpu_depth_unprojection: matches!(self.depth_path, DepthPath::Gpu(_)),
            triangle_ids: self.attachments.has_triangle_ids(),
            device_export: cfg!(feature = "device-export"),
        }
    }

    /// Fragment targets a draw pipeline must declare, in location order.
    pub fn color_targets(&self) -> Vec<Option<wgpu::ColorTargetState>> {
        let id_target = Some(wgpu::ColorTargetState {
            format: ID_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        });
        let mut targets = vec![
            Some(wgpu::ColorTargetState {
                format: self.attachments.color_format(),
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            id_target.clone(),
        ];
        if self.attachments.has_triangle_ids() {
            targets.push(id_target);
        }
        targets
    }

    /// Depth state matching the depth attachment (less-than test, writes on).
    pub fn depth_stencil_state(&self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }

    /// Starts a draw session: clears every attachment and returns the guard draws record into.
    ///
    /// Color clears to transparent black, depth to the far plane, ids to
    /// [`NO_OBJECT`](super::NO_OBJECT).
    pub fn render_enter(&mut self) -> RenderSession<'_, 's> {
        RenderSession::begin(self)
    }

    /// Copies the color attachment verbatim into `view` (any RGBA8 format).
    pub fn read_frame_rgba(&self, view: &mut ImageViewMut<'_>) -> Result<(), TargetError> {
        view.expect_size(self.size)?;
        format::check_rgba(view)?;

        let encoder = self.encoder("read rgba");
        let texels: Vec<u8> = read_attachment(&self.device, &self.queue, encoder, &self.attachments.color, self.size)?;
        format::write_rgba(&texels, view)
    }

    /// Reads linear depth into an `R32Float` view.
    ///
    /// Unprojects on the device when a depth unprojector was supplied, on the host otherwise.
    pub fn read_frame_depth(&self, view: &mut ImageViewMut<'_>) -> Result<(), TargetError> {
        view.expect_size(self.size)?;
        format::check_depth(view)?;

        let mut encoder = self.encoder("read depth");
        self.record_depth_bits(&mut encoder);
        let mut depth: Vec<f32> =
            read_attachment(&self.device, &self.queue, encoder, &self.attachments.depth_bits, self.size)?;
        if let DepthPath::Cpu = self.depth_path {
            self.unprojection.unproject_in_place(&mut depth);
        }
        format::write_depth(&depth, view)
    }

    /// Reads object ids into an `R16Uint`, `R32Uint` or `R32Int` view.
    pub fn read_frame_object_id(&self, view: &mut ImageViewMut<'_>) -> Result<(), TargetError> {
        view.expect_size(self.size)?;
        format::check_ids(view)?;

        let encoder = self.encoder("read object id");
        let ids: Vec<u32> =
            read_attachment(&self.device, &self.queue, encoder, &self.attachments.object_id, self.size)?;
        format::write_ids(&ids, view)
    }

    /// Reads triangle ids; same view contract as [`read_frame_object_id`](Self::read_frame_object_id).
    #[cfg(feature = "triangle-id")]
    pub fn read_frame_triangle_id(&self, view: &mut ImageViewMut<'_>) -> Result<(), TargetError> {
        let triangle_id = self.triangle_attachment()?;
        view.expect_size(self.size)?;
        format::check_ids(view)?;

        let encoder = self.encoder("read triangle id");
        let ids: Vec<u32> = read_attachment(&self.device, &self.queue, encoder, triangle_id, self.size)?;
        format::write_ids(&ids, view)
    }

    /// Records a copy of the color attachment into the presentation target.
    ///
    /// Only `target` is written; submission stays with the encoder's owner.
    /// Bytes are preserved whatever the sRGB-ness of either side.
    pub fn blit_rgba_to_default(&mut self, target: &mut FrameTarget<'_>) -> Result<(), TargetError> {
        self.blitter.blit(&self.device, &self.attachments.color, target)
    }

    pub(super) fn encoder(&self, what: &str) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&format!("{} {what}", self.label)),
        })
    }

    /// Fills the depth-bits plane: linear depth on the `Gpu` path, raw depth on the `Cpu` one.
    pub(super) fn record_depth_bits(&self, encoder: &mut wgpu::CommandEncoder) {
        let depth = &self.attachments.depth.view;
        let out = &self.attachments.depth_bits.view;
        match self.depth_path {
            DepthPath::Gpu(shader) => shader.unproject(&self.device, encoder, depth, out, self.unprojection),
            DepthPath::Cpu => self.raw_depth.record(&self.device, encoder, depth, out),
        }
    }

    #[cfg(feature = "triangle-id")]
    fn triangle_attachment(&self) -> Result<&Attachment, TargetError> {
        self.attachments.triangle_id.as_ref().ok_or_else(no_triangle_ids)
    }
}

/// Usages each plane is allocated with.
fn plane_usages(color_format: wgpu::TextureFormat) -> [(wgpu::TextureFormat, wgpu::TextureUsages); 4] {
    use wgpu::TextureUsages as U;
    [
        (color_format, U::RENDER_ATTACHMENT | U::COPY_SRC | U::TEXTURE_BINDING),
        (ID_FORMAT, U::RENDER_ATTACHMENT | U::COPY_SRC),
        (DEPTH_FORMAT, U::RENDER_ATTACHMENT | U::TEXTURE_BINDING),
        (DEPTH_BITS_FORMAT, U::RENDER_ATTACHMENT | U::COPY_SRC),
    ]
}

fn missing_usages(features: &wgpu::TextureFormatFeatures, needed: wgpu::TextureUsages) -> wgpu::TextureUsages {
    needed - features.allowed_usages
}

/// Rejects adapters that cannot back every plane before anything is allocated.
fn check_renderable(gpu: &impl GpuHandles, color_format: wgpu::TextureFormat) -> Result<(), TargetError> {
    for (format, needed) in plane_usages(color_format) {
        let missing = missing_usages(&gpu.format_features(format), needed);
        if !missing.is_empty() {
            return Err(TargetError::configuration(format!(
                "adapter does not support {missing:?} for {format:?}"
            )));
        }
    }
    Ok(())
}

pub(super) fn no_gpu_depth() -> TargetError {
    TargetError::configuration("no depth unprojector was supplied at construction")
}

#[cfg(feature = "triangle-id")]
pub(super) fn no_triangle_ids() -> TargetError {
    TargetError::configuration("no triangle-id attachment; supply a TriangleShader at construction")
}

impl Drop for RenderTarget<'_> {
    fn drop(&mut self) {
        log::info!("{}: releasing {} framebuffer", self.label, self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(allowed_usages: wgpu::TextureUsages) -> wgpu::TextureFormatFeatures {
        wgpu::TextureFormatFeatures {
            allowed_usages,
            flags: wgpu::TextureFormatFeatureFlags::empty(),
        }
    }

    #[test]
    fn depth_plane_needs_no_copy_usage() {
        let (format, usage) = plane_usages(wgpu::TextureFormat::Rgba8Unorm)[2];
        assert_eq!(format, DEPTH_FORMAT);
        assert!(!usage.contains(wgpu::TextureUsages::COPY_SRC));
    }

    #[test]
    fn no_plane_asks_for_a_float_render_target() {
        for (format, _) in plane_usages(wgpu::TextureFormat::Rgba8UnormSrgb) {
            assert_ne!(format, wgpu::TextureFormat::R32Float);
        }
    }

    #[test]
    fn reports_usages_the_format_lacks() {
        use wgpu::TextureUsages as U;
        let needed = U::RENDER_ATTACHMENT | U::COPY_SRC;
        assert!(missing_usages(&features(U::all()), needed).is_empty());
        assert_eq!(
            missing_usages(&features(U::RENDER_ATTACHMENT | U::TEXTURE_BINDING), needed),
            U::COPY_SRC
        );
    }
}
