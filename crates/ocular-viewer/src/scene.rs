//! Demo scene: a few overlapping triangles drawn into a render target.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use ouroboros::self_referencing;
use wgpu::util::DeviceExt;

use ocular_engine::device::GpuHandles;
use ocular_engine::target::{
    DepthShader, DepthUnprojection, ImageViewMut, PixelFormat, RenderTarget, Size, TargetConfig,
    TargetShaders,
};

const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
    object_id: u32,
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Uint32];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// One triangle per object, staggered in depth.
fn demo_vertices() -> Vec<Vertex> {
    let objects = [
        (1, [0.9, 0.2, 0.2], -0.6, 0.0),
        (2, [0.2, 0.8, 0.3], 0.0, -1.0),
        (3, [0.2, 0.4, 0.9], 0.6, -2.0),
    ];
    objects
        .into_iter()
        .flat_map(|(object_id, color, x, z): (u32, [f32; 3], f32, f32)| {
            [[-0.8, -0.7], [0.8, -0.7], [0.0, 0.8]].map(|[dx, dy]| Vertex {
                position: [x + dx, dy, z],
                color,
                object_id,
            })
        })
        .collect()
}

/// Camera matrices for a framebuffer of `size`.
fn camera(size: Size) -> (Mat4, Mat4) {
    let aspect = size.width as f32 / size.height as f32;
    let projection = Mat4::perspective_rh(45f32.to_radians(), aspect, NEAR, FAR);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.5, 3.0), Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
    (projection, view)
}

/// Pipeline and buffers for the demo geometry.
pub struct DemoPass {
    pipeline: wgpu::RenderPipeline,
    vertices: wgpu::Buffer,
    vertex_count: u32,
    bind_group: wgpu::BindGroup,
}

impl DemoPass {
    fn new(device: &wgpu::Device, target: &RenderTarget<'_>, view_proj: Mat4) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("demo shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/demo.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("demo camera bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("demo camera"),
            contents: bytemuck::cast_slice(&view_proj.to_cols_array()),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("demo camera bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("demo pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let targets = target.color_targets();
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("demo pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(target.depth_stencil_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let vertices = demo_vertices();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("demo vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            pipeline,
            vertices: vertex_buffer,
            vertex_count: vertices.len() as u32,
            bind_group,
        }
    }
}

/// What lies under a framebuffer pixel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pick {
    pub object_id: u32,
    pub distance: f32,
}

/// Render target plus the depth shader it borrows and the geometry drawn into it.
#[self_referencing]
pub struct Scene {
    depth_shader: DepthShader,
    pass: Option<DemoPass>,

    #[borrows(depth_shader)]
    #[covariant]
    target: RenderTarget<'this>,
}

impl Scene {
    /// Builds a scene whose target matches `size`.
    pub fn create(gpu: &impl GpuHandles, size: Size) -> Result<Self> {
        let (projection, view) = camera(size);
        let unprojection = DepthUnprojection::from_projection(&projection)?;
        let depth_shader = DepthShader::new(gpu.device())?;

        let mut scene = SceneTryBuilder {
            depth_shader,
            pass: None,
            target_builder: |shader: &DepthShader| {
                RenderTarget::with_config(
                    gpu,
                    size,
                    unprojection,
                    TargetShaders::none().depth(shader),
                    TargetConfig {
                        label: "viewer".to_string(),
                        ..TargetConfig::default()
                    },
                )
            },
        }
        .try_build()?;

        scene.with_mut(|fields| {
            *fields.pass = Some(DemoPass::new(gpu.device(), fields.target, projection * view));
            log::info!("scene target {size}: {:?}", fields.target.capabilities());
        });

        Ok(scene)
    }

    pub fn size(&self) -> Size {
        self.borrow_target().framebuffer_size()
    }

    /// Clears the target and draws the demo geometry.
    pub fn render(&mut self) {
        self.with_mut(|fields| {
            let Some(demo) = fields.pass.as_ref() else { return };

            let mut session = fields.target.render_enter();
            {
                let mut pass = session.begin_draw_pass("demo draw");
                pass.set_pipeline(&demo.pipeline);
                pass.set_bind_group(0, &demo.bind_group, &[]);
                pass.set_vertex_buffer(0, demo.vertices.slice(..));
                pass.draw(0..demo.vertex_count, 0..1);
            }
            session.render_exit();
        });
    }

    /// Reads object id and linear depth at pixel `(x, y)`.
    ///
    /// Reads the whole frame; fine for click-driven picking.
    pub fn pick(&self, x: u32, y: u32) -> Result<Option<Pick>> {
        let target = self.borrow_target();
        let size = target.framebuffer_size();
        if x >= size.width || y >= size.height {
            return Ok(None);
        }
        let index = (y * size.width + x) as usize * 4;

        let mut ids = vec![0u8; size.area() * 4];
        target.read_frame_object_id(&mut ImageViewMut::new(PixelFormat::R32Uint, size, &mut ids)?)?;
        let mut depth = vec![0u8; size.area() * 4];
        target.read_frame_depth(&mut ImageViewMut::new(PixelFormat::R32Float, size, &mut depth)?)?;

        let word = |bytes: &[u8]| [bytes[index], bytes[index + 1], bytes[index + 2], bytes[index + 3]];
        Ok(Some(Pick {
            object_id: u32::from_ne_bytes(word(&ids)),
            distance: f32::from_ne_bytes(word(&depth)),
        }))
    }

    /// Records the color plane into the presented frame.
    pub fn present(&mut self, frame: &mut ocular_engine::device::FrameTarget<'_>) -> Result<()> {
        self.with_target_mut(|target| target.blit_rgba_to_default(frame))?;
        Ok(())
    }
}
