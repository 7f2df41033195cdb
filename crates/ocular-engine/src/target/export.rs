//! Device-to-device readback into caller-owned buffers.
//!
//! The destination stands in for a raw device pointer: it is allocated and freed
//! by the caller and must live on the same device as the target. That is not
//! checked here. Layout is dense, rows top to bottom, one native element per
//! pixel (`[u8; 4]`, `f32`, `i32`).

use super::attachment::Attachment;
use super::readback::{padded_bytes_per_row, wait_idle};
use super::render_target::no_gpu_depth;
#[cfg(feature = "triangle-id")]
use super::render_target::no_triangle_ids;
use super::{DepthPath, RenderTarget, Size, TargetError};

impl RenderTarget<'_> {
    /// Copies RGBA8 texels into `dst` (`width * height * 4` bytes).
    pub fn read_frame_rgba_gpu(&mut self, dst: &wgpu::Buffer) -> Result<(), TargetError> {
        let encoder = self.encoder("export rgba");
        let mut export = Exporter {
            device: &self.device,
            queue: &self.queue,
            scratch: &mut self.export_scratch,
            size: self.size,
        };
        export.copy(encoder, &self.attachments.color, dst)
    }

    /// Copies linear depth into `dst` (`width * height * 4` bytes).
    ///
    /// Needs a depth unprojector: there is no host round trip to unproject on.
    pub fn read_frame_depth_gpu(&mut self, dst: &wgpu::Buffer) -> Result<(), TargetError> {
        if !matches!(self.depth_path, DepthPath::Gpu(_)) {
            return Err(no_gpu_depth());
        }

        let mut encoder = self.encoder("export depth");
        self.record_depth_bits(&mut encoder);
        let mut export = Exporter {
            device: &self.device,
            queue: &self.queue,
            scratch: &mut self.export_scratch,
            size: self.size,
        };
        export.copy(encoder, &self.attachments.depth_bits, dst)
    }

    /// Copies object ids into `dst` as `i32` (`width * height * 4` bytes).
    pub fn read_frame_object_id_gpu(&mut self, dst: &wgpu::Buffer) -> Result<(), TargetError> {
        let encoder = self.encoder("export object id");
        let mut export = Exporter {
            device: &self.device,
            queue: &self.queue,
            scratch: &mut self.export_scratch,
            size: self.size,
        };
        export.copy(encoder, &self.attachments.object_id, dst)
    }

    /// Copies triangle ids into `dst` as `i32` (`width * height * 4` bytes).
    #[cfg(feature = "triangle-id")]
    pub fn read_frame_triangle_id_gpu(&mut self, dst: &wgpu::Buffer) -> Result<(), TargetError> {
        let Some(ids) = self.attachments.triangle_id.as_ref() else {
            return Err(no_triangle_ids());
        };
        let encoder = self.encoder("export triangle id");
        let mut export = Exporter {
            device: &self.device,
            queue: &self.queue,
            scratch: &mut self.export_scratch,
            size: self.size,
        };
        export.copy(encoder, ids, dst)
    }
}

/// Field-level borrows of a target needed to run one export.
struct Exporter<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    /// Padded staging reused across exports; every attachment has 4-byte texels.
    scratch: &'a mut Option<wgpu::Buffer>,
    size: Size,
}

impl Exporter<'_> {
    /// Appends a dense copy of `src` into `dst`, submits and waits for completion.
    fn copy(
        &mut self,
        mut encoder: wgpu::CommandEncoder,
        src: &Attachment,
        dst: &wgpu::Buffer,
    ) -> Result<(), TargetError> {
        let texel_size = src.kind.texel_size();
        let tight_bpr = self.size.width * texel_size;
        let required = tight_bpr as u64 * self.size.height as u64;

        if !dst.usage().contains(wgpu::BufferUsages::COPY_DST) {
            return Err(TargetError::contract("export destination lacks COPY_DST usage"));
        }
        if dst.size() < required {
            return Err(TargetError::contract(format!(
                "export destination holds {} bytes, {:?} of {} needs {required}",
                dst.size(),
                src.kind,
                self.size
            )));
        }

        let source = wgpu::TexelCopyTextureInfo {
            texture: &src.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        };

        if tight_bpr % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT == 0 {
            // Rows are already aligned; copy straight into the caller's buffer.
            encoder.copy_texture_to_buffer(
                source,
                wgpu::TexelCopyBufferInfo {
                    buffer: dst,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(tight_bpr),
                        rows_per_image: Some(self.size.height),
                    },
                },
                self.size.extent(),
            );
        } else {
            let padded_bpr = padded_bytes_per_row(self.size.width, texel_size);
            let scratch = self.scratch(padded_bpr as u64 * self.size.height as u64);

            encoder.copy_texture_to_buffer(
                source,
                wgpu::TexelCopyBufferInfo {
                    buffer: &scratch,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_bpr),
                        rows_per_image: Some(self.size.height),
                    },
                },
                self.size.extent(),
            );
            for row in 0..self.size.height as u64 {
                encoder.copy_buffer_to_buffer(
                    &scratch,
                    row * padded_bpr as u64,
                    dst,
                    row * tight_bpr as u64,
                    tight_bpr as u64,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        wait_idle(self.device)?;

        log::trace!("exported {:?} {} to device buffer", src.kind, self.size);
        Ok(())
    }

    fn scratch(&mut self, size: u64) -> wgpu::Buffer {
        if let Some(buf) = self.scratch.as_ref().filter(|b| b.size() >= size) {
            return buf.clone();
        }
        let buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ocular export scratch"),
            size,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        log::debug!("export scratch allocated: {size} bytes");
        *self.scratch = Some(buf.clone());
        buf
    }
}
