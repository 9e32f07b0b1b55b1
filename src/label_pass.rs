//! Floating preset names.
//!
//! Every label's glyph quads are built once into a single vertex buffer.
//! Each frame, visible labels get their own slot in a dynamic-offset
//! uniform buffer and are drawn over the blob without depth testing.

use std::ops::Range;
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::assets::{FontAtlas, GlyphMetrics, layout_line};
use crate::color::Color;
use crate::gpu::GpuContext;
use crate::render_graph::{RenderContext, RenderNode};
use crate::stage::{Label, Wipe};

/// Surface pixels per world unit of label height.
pub const PIXELS_PER_LABEL_UNIT: f32 = 2000.0;

/// World height of one em for a surface `width` physical pixels wide.
///
/// Sizes follow the logical width, so a HiDPI display shows labels at the
/// same size as a standard one.
pub fn label_size(width: u32, scale_factor: f64) -> f32 {
    (width as f64 / scale_factor.max(f64::EPSILON)) as f32 / PIXELS_PER_LABEL_UNIT
}

/// Glyph corner in em units, centred on the label's origin, y up.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LabelVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl LabelVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LabelVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };
}

/// Vertices for every label plus the slice belonging to each.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelMesh {
    pub vertices: Vec<LabelVertex>,
    pub ranges: Vec<Range<u32>>,
}

impl LabelMesh {
    pub fn build<M: GlyphMetrics + ?Sized>(font: &M, texts: &[&str]) -> Self {
        let mut mesh = Self::default();
        let em = font.size();
        let center_y = (font.ascent() + font.descent()) * 0.5;

        for text in texts {
            let start = mesh.vertices.len() as u32;
            let center_x = font.measure(text) * 0.5;
            for g in layout_line(font, text) {
                let x0 = (g.min[0] - center_x) / em;
                let x1 = (g.max[0] - center_x) / em;
                let y0 = (g.min[1] - center_y) / em;
                let y1 = (g.max[1] - center_y) / em;
                // Atlas rows run downward, so the glyph top takes uv_min.y.
                let v = |x, y, u, w| LabelVertex {
                    position: [x, y],
                    uv: [u, w],
                };
                mesh.vertices.extend_from_slice(&[
                    v(x0, y1, g.uv_min[0], g.uv_min[1]),
                    v(x0, y0, g.uv_min[0], g.uv_max[1]),
                    v(x1, y1, g.uv_max[0], g.uv_min[1]),
                    v(x1, y1, g.uv_max[0], g.uv_min[1]),
                    v(x0, y0, g.uv_min[0], g.uv_max[1]),
                    v(x1, y0, g.uv_max[0], g.uv_max[1]),
                ]);
            }
            mesh.ranges.push(start..mesh.vertices.len() as u32);
        }
        mesh
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LabelUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// Wipe progress, wipe direction, unused, unused.
    pub params: [f32; 4],
    pub color: [f32; 4],
}

impl LabelUniforms {
    pub fn new(label: &Label, wipe: &Wipe, view_proj: Mat4, world_size: f32) -> Self {
        let model = label.transform().matrix() * Mat4::from_scale(Vec3::splat(world_size));
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            params: [wipe.progress, wipe.direction, 0.0, 0.0],
            color: Color::WHITE.to_linear().to_array(),
        }
    }
}

pub struct LabelPass {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: Option<wgpu::Buffer>,
    ranges: Vec<Range<u32>>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    font_bind_group: wgpu::BindGroup,
    stride: u64,
}

impl LabelPass {
    pub fn new(gpu: &GpuContext, font: Arc<FontAtlas>, texts: &[&str]) -> Self {
        use wgpu::util::DeviceExt;

        let device = &gpu.device;
        let mesh = LabelMesh::build(font.as_ref(), texts);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Label Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/label.wgsl").into()),
        });

        // wgpu rejects zero-sized vertex buffers; a font with no drawable
        // glyphs leaves every label empty.
        let vertex_buffer = (!mesh.vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Label Vertex Buffer"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let uniform_size = std::mem::size_of::<LabelUniforms>() as u64;
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = uniform_size.div_ceil(alignment) * alignment;
        let slots = texts.len().max(1) as u64;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Label Uniforms"),
            size: stride * slots,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Label Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(uniform_size),
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Label Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(uniform_size),
                }),
            }],
        });

        let font_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Label Font Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let font_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Label Font Bind Group"),
            layout: &font_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&font.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&font.sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Label Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &font_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Label Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[LabelVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Both faces: labels bend through the wipe.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buffer,
            ranges: mesh.ranges,
            uniform_buffer,
            uniform_bind_group,
            font_bind_group,
            stride,
        }
    }
}

impl RenderNode for LabelPass {
    fn execute(&self, ctx: &mut RenderContext, target: &wgpu::TextureView) {
        let Some(vertex_buffer) = &self.vertex_buffer else {
            return;
        };
        let stage = ctx.stage;
        let visible: Vec<usize> = stage
            .visible_labels()
            .filter(|&i| i < self.ranges.len())
            .collect();
        if visible.is_empty() {
            return;
        }

        let view_proj = ctx.camera.view_projection(ctx.gpu.aspect());
        let world_size = label_size(ctx.gpu.width(), ctx.gpu.scale_factor());
        let mut bytes = vec![0u8; self.stride as usize * visible.len()];
        for (slot, &i) in visible.iter().enumerate() {
            let uniforms = LabelUniforms::new(&stage.labels[i], &stage.wipe, view_proj, world_size);
            let start = slot * self.stride as usize;
            let raw = bytemuck::bytes_of(&uniforms);
            bytes[start..start + raw.len()].copy_from_slice(raw);
        }
        ctx.gpu.queue.write_buffer(&self.uniform_buffer, 0, &bytes);

        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Label Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.font_bind_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        for (slot, &i) in visible.iter().enumerate() {
            let offset = (slot as u64 * self.stride) as u32;
            pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
            pass.draw(self.ranges[i].clone(), 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::GlyphInfo;
    use std::collections::HashMap;

    struct Blocky(HashMap<char, GlyphInfo>);

    impl GlyphMetrics for Blocky {
        fn glyph(&self, c: char) -> Option<&GlyphInfo> {
            self.0.get(&c)
        }
        fn size(&self) -> f32 {
            10.0
        }
        fn ascent(&self) -> f32 {
            8.0
        }
        fn descent(&self) -> f32 {
            -2.0
        }
    }

    fn blocky() -> Blocky {
        let block = GlyphInfo {
            uv: [0.0, 0.0, 0.5, 0.5],
            width: 10,
            height: 6,
            offset_x: 0.0,
            offset_y: 0.0,
            advance: 10.0,
        };
        let space = GlyphInfo {
            width: 0,
            height: 0,
            ..block
        };
        Blocky(HashMap::from([('x', block), (' ', space)]))
    }

    #[test]
    fn labels_get_separate_ranges() {
        let mesh = LabelMesh::build(&blocky(), &["xx", "x x", ""]);
        assert_eq!(mesh.ranges, vec![0..12, 12..24, 24..24]);
        assert_eq!(mesh.vertices.len(), 24);
    }

    #[test]
    fn labels_are_centred_in_em_units() {
        let mesh = LabelMesh::build(&blocky(), &["xx"]);
        let xs: Vec<f32> = mesh.vertices.iter().map(|v| v.position[0]).collect();
        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!((min_x + 1.0).abs() < 1e-6);
        assert!((max_x - 1.0).abs() < 1e-6);

        // Vertical centre sits halfway between ascent and descent (y = 3).
        let top = mesh.vertices[0];
        assert!((top.position[1] - 0.3).abs() < 1e-6);
        assert_eq!(top.uv, [0.0, 0.0]);
        let bottom = mesh.vertices[1];
        assert!((bottom.position[1] + 0.3).abs() < 1e-6);
        assert_eq!(bottom.uv, [0.0, 0.5]);
    }

    #[test]
    fn label_size_tracks_surface_width() {
        assert_eq!(label_size(2000, 1.0), 1.0);
        assert_eq!(label_size(1000, 1.0), 0.5);
    }

    #[test]
    fn label_size_uses_logical_pixels() {
        assert_eq!(label_size(4000, 2.0), label_size(2000, 1.0));
        assert_eq!(label_size(3000, 1.5), 1.0);
    }

    #[test]
    fn uniforms_scale_by_label_and_world_size() {
        let label = Label {
            text: "Foil",
            position: Vec3::new(8.0, 0.0, 2.0),
            scale: 1.0,
        };
        let wipe = Wipe {
            progress: 0.25,
            direction: -1.0,
        };
        let uniforms = LabelUniforms::new(&label, &wipe, Mat4::IDENTITY, 0.5);
        let model = Mat4::from_cols_array_2d(&uniforms.model);
        let corner = model.transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!((corner - Vec3::new(8.5, 0.5, 2.0)).length() < 1e-6);
        assert_eq!(uniforms.params, [0.25, -1.0, 0.0, 0.0]);
    }
}
