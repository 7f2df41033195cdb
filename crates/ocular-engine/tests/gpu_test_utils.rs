#![allow(dead_code)]
//! Shared headless device and drawing helpers for render target tests.
//!
//! One device is created per test binary. Tests using it are `#[ignore]`d and
//! need an adapter, a software one is enough.

use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};
use ocular_engine::device::{GpuHandles, GpuInit, HeadlessGpu};
#[cfg(feature = "triangle-id")]
use ocular_engine::target::TriangleShader;
use ocular_engine::target::{DEPTH_FORMAT, ID_FORMAT, RenderTarget, Size};
use wgpu::util::DeviceExt;

static GPU: OnceLock<HeadlessGpu> = OnceLock::new();

/// The shared test device.
pub fn test_gpu() -> &'static HeadlessGpu {
    GPU.get_or_init(|| HeadlessGpu::new_blocking(GpuInit::default()).expect("GPU tests need an adapter"))
}

const FILL_WGSL: &str = r#"
struct Params {
    rect: vec4<f32>,
    color: vec4<f32>,
    depth: f32,
    object_id: u32,
    triangle_id: u32,
    _pad: u32,
};

@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0), vec2<f32>(1.0, 0.0), vec2<f32>(1.0, 1.0),
    );
    let c = corners[i];
    let x = mix(params.rect.x, params.rect.z, c.x);
    let y = mix(params.rect.y, params.rect.w, c.y);
    return vec4<f32>(x, y, params.depth, 1.0);
}

struct Out {
    @location(0) color: vec4<f32>,
    @location(1) object_id: u32,
};

struct OutWithTriangle {
    @location(0) color: vec4<f32>,
    @location(1) object_id: u32,
    @location(2) triangle_id: u32,
};

@fragment
fn fs_main() -> Out {
    return Out(params.color, params.object_id);
}

@fragment
fn fs_main_triangle() -> OutWithTriangle {
    return OutWithTriangle(params.color, params.object_id, params.triangle_id);
}
"#;

/// Pixel rectangle `[x0, x1) x [y0, y1)`, top-left origin.
#[derive(Debug, Copy, Clone)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn full(size: Size) -> Self {
        Self { x0: 0, y0: 0, x1: size.width, y1: size.height }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// What one fill writes into every covered pixel.
#[derive(Debug, Copy, Clone)]
pub struct Fill {
    pub rect: PixelRect,
    /// Exactly representable in 8-bit unorm.
    pub color: [f32; 4],
    /// Raw device depth in `[0, 1)`.
    pub depth: f32,
    pub object_id: u32,
    pub triangle_id: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FillUniform {
    rect: [f32; 4],
    color: [f32; 4],
    depth: f32,
    object_id: u32,
    triangle_id: u32,
    _pad: u32,
}

impl Fill {
    fn uniform(&self, size: Size) -> FillUniform {
        let ndc_x = |px: u32| -1.0 + 2.0 * px as f32 / size.width as f32;
        let ndc_y = |py: u32| 1.0 - 2.0 * py as f32 / size.height as f32;
        FillUniform {
            rect: [ndc_x(self.rect.x0), ndc_y(self.rect.y0), ndc_x(self.rect.x1), ndc_y(self.rect.y1)],
            color: self.color,
            depth: self.depth,
            object_id: self.object_id,
            triangle_id: self.triangle_id,
            _pad: 0,
        }
    }
}

/// Pipeline drawing a solid rectangle into every plane of a render target.
pub struct FillPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl FillPipeline {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat, with_triangle_ids: bool) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("test fill shader"),
            source: wgpu::ShaderSource::Wgsl(FILL_WGSL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("test fill bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("test fill pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let id_target = Some(wgpu::ColorTargetState {
            format: ID_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        });
        let mut targets = vec![
            Some(wgpu::ColorTargetState {
                format: color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            id_target.clone(),
        ];
        if with_triangle_ids {
            targets.push(id_target);
        }

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("test fill pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(if with_triangle_ids { "fs_main_triangle" } else { "fs_main" }),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self { pipeline, bind_group_layout }
    }

    /// Pipeline matching `target`'s declared fragment targets.
    pub fn for_target(device: &wgpu::Device, target: &RenderTarget<'_>) -> Self {
        let color_format = target.color_targets()[0]
            .as_ref()
            .map_or(wgpu::TextureFormat::Rgba8Unorm, |t| t.format);
        Self::new(device, color_format, target.capabilities().triangle_ids)
    }

    pub fn bind_group(&self, device: &wgpu::Device, size: Size, fill: &Fill) -> wgpu::BindGroup {
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("test fill uniform"),
            contents: bytemuck::bytes_of(&fill.uniform(size)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("test fill bind group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        })
    }

    pub fn draw(&self, device: &wgpu::Device, pass: &mut wgpu::RenderPass<'_>, size: Size, fill: &Fill) {
        let bind_group = self.bind_group(device, size, fill);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..6, 0..1);
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }
}

/// Draws `fills` in one session and closes it.
pub fn draw_fills(gpu: &HeadlessGpu, target: &mut RenderTarget<'_>, fills: &[Fill]) {
    let pipeline = FillPipeline::for_target(gpu.device(), target);
    let size = target.framebuffer_size();

    let mut session = target.render_enter();
    {
        let mut pass = session.begin_draw_pass("test fills");
        for fill in fills {
            pipeline.draw(gpu.device(), &mut pass, size, fill);
        }
    }
    session.render_exit();
}

/// Reads a whole 4-byte-per-texel texture back to the host, tightly packed.
pub fn read_texture(gpu: &HeadlessGpu, texture: &wgpu::Texture) -> Vec<u8> {
    let (width, height) = (texture.width(), texture.height());
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let tight = width * 4;
    let padded = tight.div_ceil(align) * align;

    let staging = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("test texture readback"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("test readback") });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        texture.size(),
    );
    gpu.queue().submit(std::iter::once(encoder.finish()));

    let mapped = map_read(gpu, &staging);
    mapped
        .chunks(padded as usize)
        .flat_map(|row| row[..tight as usize].iter().copied())
        .collect()
}

/// Maps a `MAP_READ` buffer and copies out its contents.
pub fn map_read(gpu: &HeadlessGpu, buffer: &wgpu::Buffer) -> Vec<u8> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    gpu.device()
        .poll(wgpu::PollType::wait_indefinitely())
        .expect("device poll failed");
    rx.recv().expect("map callback dropped").expect("map failed");

    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    bytes
}

pub fn u32s(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Triangle shader drawing one fixed [`Fill`]; triangle ids come from `Fill::triangle_id`.
#[cfg(feature = "triangle-id")]
pub struct TriangleFill {
    fill: FillPipeline,
    bind_group: wgpu::BindGroup,
}

#[cfg(feature = "triangle-id")]
impl TriangleFill {
    pub fn new(device: &wgpu::Device, size: Size, fill: &Fill) -> Self {
        let pipeline = FillPipeline::new(device, wgpu::TextureFormat::Rgba8Unorm, true);
        let bind_group = pipeline.bind_group(device, size, fill);
        Self { fill: pipeline, bind_group }
    }

    /// Draws the fill into a session opened on a target built with this shader.
    pub fn draw_into(&self, target: &mut RenderTarget<'_>) {
        let mut session = target.render_enter();
        {
            let mut pass = session.begin_draw_pass("test triangles");
            self.bind(&mut pass);
            pass.draw(0..6, 0..1);
        }
        session.render_exit();
    }
}

#[cfg(feature = "triangle-id")]
impl TriangleShader for TriangleFill {
    fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(self.fill.pipeline());
        pass.set_bind_group(0, &self.bind_group, &[]);
    }
}
