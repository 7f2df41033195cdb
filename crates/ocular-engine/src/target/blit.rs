//! Presentation blit: color attachment -> on-screen target.

use super::attachment::Attachment;
use super::scope::guarded;
use super::TargetError;
use crate::device::FrameTarget;

/// Fragment entry point that keeps the stored bytes intact between the two formats.
///
/// Sampling an sRGB texture decodes and writing an sRGB target encodes; when only
/// one side does, the shader applies the inverse transfer function.
pub(crate) fn entry_point(source: wgpu::TextureFormat, dest: wgpu::TextureFormat) -> &'static str {
    match (source.is_srgb(), dest.is_srgb()) {
        (false, true) => "fs_to_linear",
        (true, false) => "fs_to_srgb",
        _ => "fs_copy",
    }
}

struct BlitPipeline {
    source: wgpu::TextureFormat,
    dest: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// Lazily built blit pipeline, rebuilt when either format changes.
#[derive(Default)]
pub(crate) struct Blitter {
    cached: Option<BlitPipeline>,
}

impl Blitter {
    /// Records a copy of `color` into `target`.
    pub fn blit(
        &mut self,
        device: &wgpu::Device,
        color: &Attachment,
        target: &mut FrameTarget<'_>,
    ) -> Result<(), TargetError> {
        let blit = self.pipeline(device, color.texture.format(), target.format)?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ocular blit bind group"),
            layout: &blit.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&color.view),
            }],
        });

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ocular blit pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&blit.pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.draw(0..3, 0..1);
        Ok(())
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        source: wgpu::TextureFormat,
        dest: wgpu::TextureFormat,
    ) -> Result<&BlitPipeline, TargetError> {
        let stale = !matches!(&self.cached, Some(b) if b.source == source && b.dest == dest);
        if stale {
            self.cached = Some(build(device, source, dest)?);
            log::debug!("blit pipeline built for {source:?} -> {dest:?}");
        }
        self.cached
            .as_ref()
            .ok_or_else(|| TargetError::Resource("blit pipeline missing".into()))
    }
}

fn build(
    device: &wgpu::Device,
    source: wgpu::TextureFormat,
    dest: wgpu::TextureFormat,
) -> Result<BlitPipeline, TargetError> {
    guarded(device, "building blit pipeline", || {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ocular blit shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ocular blit bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ocular blit pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ocular blit pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(entry_point(source, dest)),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: dest,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        BlitPipeline {
            source,
            dest,
            pipeline,
            bind_group_layout,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    #[test]
    fn matching_encodings_copy_straight() {
        assert_eq!(entry_point(F::Rgba8Unorm, F::Bgra8Unorm), "fs_copy");
        assert_eq!(entry_point(F::Rgba8UnormSrgb, F::Bgra8UnormSrgb), "fs_copy");
    }

    #[test]
    fn mismatched_encodings_undo_the_hardware_conversion() {
        // An sRGB destination encodes on write, so the shader decodes first.
        assert_eq!(entry_point(F::Rgba8Unorm, F::Bgra8UnormSrgb), "fs_to_linear");
        // An sRGB source decodes on load, so the shader re-encodes.
        assert_eq!(entry_point(F::Rgba8UnormSrgb, F::Rgba8Unorm), "fs_to_srgb");
    }

    #[test]
    fn every_entry_point_exists_in_the_shader() {
        let source = include_str!("shaders/blit.wgsl");
        for entry in ["fs_copy", "fs_to_linear", "fs_to_srgb"] {
            assert!(source.contains(&format!("fn {entry}(")), "{entry}");
        }
    }
}
