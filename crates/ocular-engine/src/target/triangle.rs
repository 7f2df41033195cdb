/// Host-supplied shader that writes per-triangle ids.
///
/// Its fragment stage writes the id to `@location(2)`, the triangle-id
/// attachment. The render target borrows it and hands it back to draw code
/// through [`RenderSession::triangle_shader`](super::RenderSession::triangle_shader).
pub trait TriangleShader {
    /// Binds the pipeline and any resources it needs on `pass`.
    fn bind(&self, pass: &mut wgpu::RenderPass<'_>);
}
