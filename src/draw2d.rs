use std::sync::Arc;

use crate::assets::{FontAtlas, GlyphMetrics, layout_line};
use crate::color::Color;
use crate::gpu::GpuContext;

/// Vertex for 2D sprite/text rendering.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2d {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex2d {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex2d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            // color
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

/// Uniforms for 2D rendering.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Draw2dUniforms {
    resolution: [f32; 2],
    _padding: [f32; 2],
}

const MAX_VERTICES: usize = 16384;

/// Two triangles covering `[x0, x1] x [y0, y1]` in screen pixels.
fn quad(
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    uv0: [f32; 2],
    uv1: [f32; 2],
    color: [f32; 4],
) -> [Vertex2d; 6] {
    let v = |x, y, u, w| Vertex2d {
        position: [x, y],
        uv: [u, w],
        color,
    };
    [
        v(x0, y0, uv0[0], uv0[1]),
        v(x1, y0, uv1[0], uv0[1]),
        v(x0, y1, uv0[0], uv1[1]),
        v(x1, y0, uv1[0], uv0[1]),
        v(x1, y1, uv1[0], uv1[1]),
        v(x0, y1, uv0[0], uv1[1]),
    ]
}

/// Screen-space quads for `text` whose line box starts at `(x, y)`.
///
/// `size` is the pixel height to draw at; glyphs are scaled from the size
/// the font was rasterized at.
pub fn text_vertices<M: GlyphMetrics + ?Sized>(
    font: &M,
    x: f32,
    y: f32,
    size: f32,
    text: &str,
    color: Color,
) -> Vec<Vertex2d> {
    let scale = size / font.size();
    let baseline = y + font.ascent() * scale;
    let c = color.to_linear().to_array();

    layout_line(font, text)
        .into_iter()
        .flat_map(|g| {
            // Layout is y-up from the baseline; the screen is y-down.
            quad(
                x + g.min[0] * scale,
                baseline - g.max[1] * scale,
                x + g.max[0] * scale,
                baseline - g.min[1] * scale,
                g.uv_min,
                g.uv_max,
                c,
            )
        })
        .collect()
}

/// Immediate-mode 2D drawing API for rectangles and text.
///
/// All draw calls are batched and rendered in a single pass at the end of the frame.
pub struct Draw2d {
    // Pipelines
    colored_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,

    // Shared resources
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,

    font: Option<(Arc<FontAtlas>, wgpu::BindGroup)>,

    // Current frame batches
    colored_vertices: Vec<Vertex2d>,
    text_vertices: Vec<Vertex2d>,
}

impl Draw2d {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Draw2d Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/draw2d.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw2d Uniforms"),
            size: std::mem::size_of::<Draw2dUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Uniform bind group layout (group 0)
        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw2d Uniform Layout"),
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

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw2d Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Font atlas bind group layout (group 1)
        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw2d Texture Layout"),
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

        let colored_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Draw2d Colored Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let textured_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Draw2d Textured Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = |label: &str, layout: &wgpu::PipelineLayout, fs: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[Vertex2d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(fs),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let colored_pipeline = pipeline(
            "Draw2d Colored Pipeline",
            &colored_pipeline_layout,
            "fs_colored",
        );
        let textured_pipeline = pipeline(
            "Draw2d Textured Pipeline",
            &textured_pipeline_layout,
            "fs_textured",
        );

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw2d Vertex Buffer"),
            size: (MAX_VERTICES * std::mem::size_of::<Vertex2d>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            colored_pipeline,
            textured_pipeline,
            vertex_buffer,
            uniform_buffer,
            uniform_bind_group,
            texture_bind_group_layout,
            font: None,
            colored_vertices: Vec::with_capacity(1024),
            text_vertices: Vec::with_capacity(1024),
        }
    }

    /// Use `font` for all subsequent [`text`](Self::text) calls.
    pub fn set_font(&mut self, gpu: &GpuContext, font: Arc<FontAtlas>) {
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Font Bind Group"),
            layout: &self.texture_bind_group_layout,
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
        self.font = Some((font, bind_group));
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Width of `text` drawn at `size` pixels, if a font is set.
    pub fn text_width(&self, size: f32, text: &str) -> Option<f32> {
        let (font, _) = self.font.as_ref()?;
        Some(font.measure(text) * size / font.size())
    }

    /// Clear all draw calls for the new frame.
    pub fn clear(&mut self) {
        self.colored_vertices.clear();
        self.text_vertices.clear();
    }

    /// Draw a colored rectangle.
    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let c = color.to_linear().to_array();
        self.colored_vertices
            .extend_from_slice(&quad(x, y, x + w, y + h, [0.0, 0.0], [0.0, 0.0], c));
    }

    /// Draw text with its line box at `(x, y)`. Does nothing until a font is set.
    pub fn text(&mut self, x: f32, y: f32, size: f32, text: &str, color: Color) {
        let Some((font, _)) = &self.font else {
            return;
        };
        let vertices = text_vertices(font.as_ref(), x, y, size, text, color);
        self.text_vertices.extend(vertices);
    }

    /// Render all batched draw calls.
    pub fn render(&self, gpu: &GpuContext, render_pass: &mut wgpu::RenderPass) {
        let uniforms = Draw2dUniforms {
            resolution: [gpu.width() as f32, gpu.height() as f32],
            _padding: [0.0, 0.0],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let colored = self.colored_vertices.len().min(MAX_VERTICES);
        let text = self.text_vertices.len().min(MAX_VERTICES - colored);
        if colored + text < self.colored_vertices.len() + self.text_vertices.len() {
            log::warn!("draw2d batch exceeds {MAX_VERTICES} vertices; truncating");
        }

        if colored > 0 {
            gpu.queue.write_buffer(
                &self.vertex_buffer,
                0,
                bytemuck::cast_slice(&self.colored_vertices[..colored]),
            );

            render_pass.set_pipeline(&self.colored_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(0..colored as u32, 0..1);
        }

        let Some((_, font_bind_group)) = &self.font else {
            return;
        };
        if text > 0 {
            gpu.queue.write_buffer(
                &self.vertex_buffer,
                (colored * std::mem::size_of::<Vertex2d>()) as u64,
                bytemuck::cast_slice(&self.text_vertices[..text]),
            );

            render_pass.set_pipeline(&self.textured_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, font_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(colored as u32..(colored + text) as u32, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::GlyphInfo;

    struct OneGlyph(GlyphInfo);

    impl GlyphMetrics for OneGlyph {
        fn glyph(&self, c: char) -> Option<&GlyphInfo> {
            (c == '0').then_some(&self.0)
        }
        fn size(&self) -> f32 {
            20.0
        }
        fn ascent(&self) -> f32 {
            16.0
        }
        fn descent(&self) -> f32 {
            -4.0
        }
    }

    #[test]
    fn text_is_scaled_and_flipped_to_screen_space() {
        let font = OneGlyph(GlyphInfo {
            uv: [0.0, 0.0, 0.5, 0.5],
            width: 10,
            height: 12,
            offset_x: 0.0,
            offset_y: 0.0,
            advance: 12.0,
        });
        let vertices = text_vertices(&font, 100.0, 50.0, 40.0, "00", Color::WHITE);
        assert_eq!(vertices.len(), 12);

        // Scale 2: baseline at 50 + 16 * 2, glyph 24px tall sitting on it.
        let top_left = vertices[0];
        assert_eq!(top_left.position, [100.0, 58.0]);
        assert_eq!(top_left.uv, [0.0, 0.0]);
        let bottom_right = vertices[4];
        assert_eq!(bottom_right.position, [120.0, 82.0]);
        assert_eq!(bottom_right.uv, [0.5, 0.5]);

        assert_eq!(vertices[6].position[0], 124.0);
        assert!(top_left.color.iter().all(|c| (c - 1.0).abs() < 1e-6));
    }
}
