#[cfg(feature = "triangle-id")]
use super::TriangleShader;
use super::{RenderTarget, Size};

/// An open draw pass over a [`RenderTarget`].
///
/// Created by [`RenderTarget::render_enter`], which has already recorded the
/// clear of every attachment. Draws go through [`begin_draw_pass`](Self::begin_draw_pass);
/// [`render_exit`](Self::render_exit) submits them. The session borrows the target,
/// so reads cannot start before the pass is closed.
pub struct RenderSession<'t, 's> {
    target: &'t RenderTarget<'s>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl<'t, 's> RenderSession<'t, 's> {
    pub(super) fn begin(target: &'t RenderTarget<'s>) -> Self {
        let mut encoder = target.encoder("session");

        // Clear pass: dropped immediately, the load ops do the work.
        {
            let color_attachments = target.attachments.color_attachments(true);
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ocular clear pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(target.attachments.depth_attachment(true)),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        Self {
            target,
            encoder: Some(encoder),
        }
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.target.size
    }

    /// The encoder the session records into, for work outside a render pass.
    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let target = self.target;
        self.encoder.get_or_insert_with(|| target.encoder("session"))
    }

    /// Opens a render pass over all attachments, preserving what earlier passes wrote.
    ///
    /// Pipelines used on it must match [`RenderTarget::color_targets`] and
    /// [`RenderTarget::depth_stencil_state`].
    pub fn begin_draw_pass(&mut self, label: &str) -> wgpu::RenderPass<'_> {
        let target = self.target;
        let color_attachments = target.attachments.color_attachments(false);
        let encoder = self
            .encoder
            .get_or_insert_with(|| target.encoder("session"));

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(target.attachments.depth_attachment(false)),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }

    /// The triangle shader supplied at construction, if any.
    #[cfg(feature = "triangle-id")]
    pub fn triangle_shader(&self) -> Option<&'s dyn TriangleShader> {
        self.target.triangle_shader
    }

    /// Ends the session and submits everything recorded since `render_enter`.
    pub fn render_exit(mut self) {
        self.submit();
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.target.queue.submit(std::iter::once(encoder.finish()));
            log::trace!("session submitted for {}", self.target.size);
        }
    }
}

impl Drop for RenderSession<'_, '_> {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            log::warn!("render session dropped without render_exit; submitting recorded work");
            self.submit();
        }
    }
}
