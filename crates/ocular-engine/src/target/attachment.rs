//! The fixed set of framebuffer attachments owned by a render target.

use super::scope::guarded;
use super::{Size, TargetError};

/// Object id written wherever no object was drawn.
pub const NO_OBJECT: u32 = 0;

/// Raw depth the depth attachment is cleared to (the far plane).
pub const CLEAR_DEPTH: f32 = 1.0;

/// Format of the object-id (and triangle-id) attachments.
pub const ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;

/// Format of the raw depth attachment.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Format of the plane depth reads go through: `f32` bit patterns stored as `u32`.
///
/// Depth is never copied out of the depth attachment directly. A full-screen
/// pass loads it and writes `bitcast<u32>(value)` here, which needs neither
/// depth-texture copies nor a renderable float format.
pub const DEPTH_BITS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;

/// One image plane of the framebuffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Color,
    Depth,
    ObjectId,
    #[cfg(feature = "triangle-id")]
    TriangleId,
    /// Raw or linear depth as `f32` bits, ready to copy out.
    DepthBits,
}

impl AttachmentKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Color => "ocular color attachment",
            Self::Depth => "ocular depth attachment",
            Self::ObjectId => "ocular object id attachment",
            #[cfg(feature = "triangle-id")]
            Self::TriangleId => "ocular triangle id attachment",
            Self::DepthBits => "ocular depth bits attachment",
        }
    }

    /// Bytes per texel; every attachment is 32 bits wide.
    pub(crate) const fn texel_size(self) -> u32 {
        4
    }
}

pub(crate) struct Attachment {
    pub kind: AttachmentKind,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Attachment {
    fn new(
        device: &wgpu::Device,
        kind: AttachmentKind,
        format: wgpu::TextureFormat,
        size: Size,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(kind.label()),
            size: size.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { kind, texture, view }
    }

    fn color_attachment(&self, clear: bool) -> wgpu::RenderPassColorAttachment<'_> {
        let load = if clear {
            // Integer targets take the red channel, so ids clear to NO_OBJECT.
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        wgpu::RenderPassColorAttachment {
            view: &self.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        }
    }
}

/// Color, depth, object-id and (optionally) triangle-id planes, plus the
/// depth-bits plane reads go through. All sized alike.
pub(crate) struct Attachments {
    pub color: Attachment,
    pub depth: Attachment,
    pub object_id: Attachment,
    #[cfg(feature = "triangle-id")]
    pub triangle_id: Option<Attachment>,
    pub depth_bits: Attachment,
}

impl Attachments {
    /// Allocates every plane; any allocation or validation failure fails the whole set.
    pub fn create(
        device: &wgpu::Device,
        size: Size,
        color_format: wgpu::TextureFormat,
        with_triangle_ids: bool,
    ) -> Result<Self, TargetError> {
        use wgpu::TextureUsages as U;

        guarded(device, "allocating framebuffer attachments", || {
            let color = Attachment::new(
                device,
                AttachmentKind::Color,
                color_format,
                size,
                U::RENDER_ATTACHMENT | U::COPY_SRC | U::TEXTURE_BINDING,
            );
            let depth = Attachment::new(
                device,
                AttachmentKind::Depth,
                DEPTH_FORMAT,
                size,
                U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
            );
            let object_id = Attachment::new(
                device,
                AttachmentKind::ObjectId,
                ID_FORMAT,
                size,
                U::RENDER_ATTACHMENT | U::COPY_SRC,
            );

            #[cfg(feature = "triangle-id")]
            let triangle_id = with_triangle_ids.then(|| {
                Attachment::new(
                    device,
                    AttachmentKind::TriangleId,
                    ID_FORMAT,
                    size,
                    U::RENDER_ATTACHMENT | U::COPY_SRC,
                )
            });
            #[cfg(not(feature = "triangle-id"))]
            let _ = with_triangle_ids;

            let depth_bits = Attachment::new(
                device,
                AttachmentKind::DepthBits,
                DEPTH_BITS_FORMAT,
                size,
                U::RENDER_ATTACHMENT | U::COPY_SRC,
            );

            Self {
                color,
                depth,
                object_id,
                #[cfg(feature = "triangle-id")]
                triangle_id,
                depth_bits,
            }
        })
    }

    /// Color targets in draw-location order: color, object id, triangle id.
    pub fn color_attachments(&self, clear: bool) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
        let mut out = vec![
            Some(self.color.color_attachment(clear)),
            Some(self.object_id.color_attachment(clear)),
        ];
        #[cfg(feature = "triangle-id")]
        if let Some(tri) = &self.triangle_id {
            out.push(Some(tri.color_attachment(clear)));
        }
        out
    }

    pub fn depth_attachment(&self, clear: bool) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        let load = if clear {
            wgpu::LoadOp::Clear(CLEAR_DEPTH)
        } else {
            wgpu::LoadOp::Load
        };
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color.texture.format()
    }

    pub fn has_triangle_ids(&self) -> bool {
        #[cfg(feature = "triangle-id")]
        return self.triangle_id.is_some();
        #[cfg(not(feature = "triangle-id"))]
        false
    }
}
