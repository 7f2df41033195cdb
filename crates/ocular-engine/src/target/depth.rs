//! Depth unprojection: raw device depth to linear distance.
//!
//! Convention: right-handed perspective with a [0, 1] depth range (`glam`'s
//! `perspective_rh`), standard (non-reversed) Z, depth cleared to 1.0.
//!
//! ```text
//! d_linear = 1 / (a * d_raw + b)      a = 1 / P[3][2],  b = P[2][2] / P[3][2]
//! ```
//!
//! With near `n` and far `f` this gives `a = (n - f) / (n f)` and `b = 1 / n`,
//! so `d_raw = 0` maps to `n` and `d_raw -> 1` maps to `f`. A sample equal to the
//! clear depth means nothing was drawn and maps to `0.0`.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use super::attachment::{CLEAR_DEPTH, DEPTH_BITS_FORMAT};
use super::scope::guarded;
use super::TargetError;

/// The two scalars of the raw -> linear depth transform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DepthUnprojection {
    pub a: f32,
    pub b: f32,
}

impl DepthUnprojection {
    #[inline]
    pub const fn new(a: f32, b: f32) -> Self {
        Self { a, b }
    }

    /// Parameters for a perspective projection with the given clip planes.
    pub fn from_near_far(near: f32, far: f32) -> Result<Self, TargetError> {
        if !(near > 0.0 && far > near && far.is_finite()) {
            return Err(TargetError::configuration(format!(
                "invalid clip planes near={near} far={far}"
            )));
        }
        Ok(Self {
            a: (near - far) / (near * far),
            b: 1.0 / near,
        })
    }

    /// Derives the parameters from a perspective projection matrix.
    ///
    /// Infinite-far projections are accepted; orthographic ones are not (their
    /// depth is already linear and needs no unprojection).
    pub fn from_projection(projection: &Mat4) -> Result<Self, TargetError> {
        let p22 = projection.z_axis.z;
        let p32 = projection.w_axis.z;
        if projection.z_axis.w != -1.0 || p32 == 0.0 {
            return Err(TargetError::configuration(
                "depth unprojection needs a right-handed perspective projection",
            ));
        }
        Ok(Self {
            a: 1.0 / p32,
            b: p22 / p32,
        })
    }

    /// CPU form of the transform, identical to the GPU pass.
    #[inline]
    pub fn unproject(self, raw: f32) -> f32 {
        if raw >= CLEAR_DEPTH {
            return 0.0;
        }
        1.0 / (self.a * raw + self.b)
    }

    pub fn unproject_in_place(self, depth: &mut [f32]) {
        for d in depth {
            *d = self.unproject(*d);
        }
    }
}

/// Records an on-device unprojection of a raw depth attachment.
///
/// Implementations are supplied by the host and borrowed by the render target;
/// the target never creates or destroys them.
pub trait DepthUnprojector {
    /// Records a pass reading `raw_depth` (a `Depth32Float` view) and writing
    /// linear depth into `linear`, a [`DEPTH_BITS_FORMAT`] render attachment of
    /// equal size. Each texel receives `bitcast<u32>(distance)`, and `0` where
    /// nothing was drawn.
    fn unproject(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        raw_depth: &wgpu::TextureView,
        linear: &wgpu::TextureView,
        params: DepthUnprojection,
    );
}

/// How a depth read turns raw samples into linear ones.
#[derive(Copy, Clone)]
pub(crate) enum DepthPath<'s> {
    /// Copy raw depth to the host and unproject there.
    Cpu,
    /// Unproject on the device before copying.
    Gpu(&'s dyn DepthUnprojector),
}

impl<'s> DepthPath<'s> {
    pub fn from_option(shader: Option<&'s dyn DepthUnprojector>) -> Self {
        shader.map_or(Self::Cpu, Self::Gpu)
    }
}

const DEPTH_WGSL: &str = include_str!("shaders/depth_bits.wgsl");

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DepthPassUniform {
    a: f32,
    b: f32,
    _pad: [f32; 2], // 16-byte alignment
}

/// Full-screen pass from the depth attachment into the depth-bits plane.
struct DepthPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl DepthPass {
    fn new(device: &wgpu::Device, entry_point: &'static str, label: &'static str) -> Result<Self, TargetError> {
        guarded(device, label, || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(DEPTH_WGSL.into()),
            });

            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(
                                std::mem::size_of::<DepthPassUniform>() as u64,
                            ),
                        },
                        count: None,
                    },
                ],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: DEPTH_BITS_FORMAT,
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

            Self {
                label,
                pipeline,
                bind_group_layout,
            }
        })
    }

    fn record(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        raw_depth: &wgpu::TextureView,
        out: &wgpu::TextureView,
        params: DepthUnprojection,
    ) {
        let uniform = DepthPassUniform {
            a: params.a,
            b: params.b,
            _pad: [0.0; 2],
        };
        let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(self.label),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(raw_depth),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ubo.as_entire_binding(),
                },
            ],
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: out,
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

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}

/// The stock full-screen unprojection shader.
pub struct DepthShader {
    pass: DepthPass,
}

impl DepthShader {
    /// Builds the pipeline; fails with [`TargetError::Resource`] if the device rejects it.
    pub fn new(device: &wgpu::Device) -> Result<Self, TargetError> {
        Ok(Self {
            pass: DepthPass::new(device, "fs_unproject", "ocular unproject depth")?,
        })
    }
}

impl DepthUnprojector for DepthShader {
    fn unproject(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        raw_depth: &wgpu::TextureView,
        linear: &wgpu::TextureView,
        params: DepthUnprojection,
    ) {
        self.pass.record(device, encoder, raw_depth, linear, params);
    }
}

/// Copies raw depth unchanged into the depth-bits plane for host-side unprojection.
pub(crate) struct RawDepthPass {
    pass: DepthPass,
}

impl RawDepthPass {
    pub fn new(device: &wgpu::Device) -> Result<Self, TargetError> {
        Ok(Self {
            pass: DepthPass::new(device, "fs_raw", "ocular raw depth")?,
        })
    }

    pub fn record(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        raw_depth: &wgpu::TextureView,
        out: &wgpu::TextureView,
    ) {
        self.pass
            .record(device, encoder, raw_depth, out, DepthUnprojection::new(0.0, 0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn raw_depth_at(projection: &Mat4, distance: f32) -> f32 {
        let clip = *projection * Vec4::new(0.0, 0.0, -distance, 1.0);
        clip.z / clip.w
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-4 * b.abs().max(1.0)
    }

    #[test]
    fn near_plane_and_interior_distances() {
        let u = DepthUnprojection::from_near_far(0.1, 100.0).unwrap();
        assert!(close(u.unproject(0.0), 0.1));
        for distance in [0.1, 1.0, 12.5, 50.0] {
            let raw = (1.0 / distance - u.b) / u.a;
            assert!(close(u.unproject(raw), distance));
        }
    }

    #[test]
    fn clear_depth_maps_to_zero() {
        let u = DepthUnprojection::from_near_far(0.1, 100.0).unwrap();
        assert_eq!(u.unproject(CLEAR_DEPTH), 0.0);
    }

    #[test]
    fn matches_perspective_projection() {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 4.0 / 3.0, 0.5, 50.0);
        let u = DepthUnprojection::from_projection(&proj).unwrap();
        for distance in [0.5, 1.0, 2.5, 10.0, 33.0, 49.0] {
            let raw = raw_depth_at(&proj, distance);
            assert!((0.0..1.0).contains(&raw), "raw {raw} for {distance}");
            let linear = u.unproject(raw);
            assert!(close(linear, distance), "{linear} != {distance}");
        }
    }

    #[test]
    fn from_projection_agrees_with_near_far() {
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.25, 80.0);
        let a = DepthUnprojection::from_projection(&proj).unwrap();
        let b = DepthUnprojection::from_near_far(0.25, 80.0).unwrap();
        assert!(close(a.a, b.a));
        assert!(close(a.b, b.b));
    }

    #[test]
    fn infinite_projection_is_supported() {
        let proj = Mat4::perspective_infinite_rh(1.0, 1.0, 0.1);
        let u = DepthUnprojection::from_projection(&proj).unwrap();
        let raw = raw_depth_at(&proj, 20.0);
        assert!(close(u.unproject(raw), 20.0));
    }

    #[test]
    fn orthographic_projection_is_rejected() {
        let proj = Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        assert!(matches!(
            DepthUnprojection::from_projection(&proj),
            Err(TargetError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_planes_are_rejected() {
        assert!(DepthUnprojection::from_near_far(0.0, 10.0).is_err());
        assert!(DepthUnprojection::from_near_far(5.0, 1.0).is_err());
    }

    #[test]
    fn in_place_matches_per_sample() {
        let u = DepthUnprojection::from_near_far(1.0, 10.0).unwrap();
        let raw = [0.0, 0.25, 0.5, 0.9, 1.0];
        let mut buf = raw;
        u.unproject_in_place(&mut buf);
        for (out, r) in buf.iter().zip(raw) {
            assert_eq!(*out, u.unproject(r));
        }
    }

    /// The device pass evaluated on the host, one operation at a time as written in WGSL.
    fn shader_formula(a: f32, b: f32, d: f32) -> f32 {
        if d >= 1.0 {
            return 0.0;
        }
        1.0 / (a * d + b)
    }

    #[test]
    fn shader_source_spells_the_host_formula() {
        assert!(DEPTH_WGSL.contains("if (d >= 1.0)"));
        assert!(DEPTH_WGSL.contains("1.0 / (params.a * d + params.b)"));
        assert!(DEPTH_WGSL.contains("bitcast<u32>"));
    }

    #[test]
    fn host_transform_matches_shader_formula() {
        let u = DepthUnprojection::from_near_far(0.1, 100.0).unwrap();
        let samples = (0..=1000).map(|i| i as f32 / 1000.0).chain([0.999, 0.9999, 0.99999]);
        for raw in samples {
            let host = u.unproject(raw);
            let device = shader_formula(u.a, u.b, raw);
            assert_eq!(host.to_bits(), device.to_bits(), "raw {raw}");
        }
    }
}
