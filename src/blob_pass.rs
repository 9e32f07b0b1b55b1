//! The morphing blob.
//!
//! [`BlobPass`] clears the frame to the stage background, then draws the
//! icosphere with noise displacement in the vertex shader and image-based
//! lighting from an equirectangular environment in the fragment shader.
//!
//! Bind groups:
//! - **Group 0**: [`BlobUniforms`]
//! - **Group 1**: environment map and its non-filtering sampler
//! - **Group 2**: the active gradient map

use std::cell::Cell;
use std::collections::HashMap;

use glam::Mat4;

use crate::camera::Camera;
use crate::catalog::{SMALL_WAVE_TIME_FREQUENCY, TIME_FREQUENCY};
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Vertex3d};
use crate::render_graph::{RenderContext, RenderNode};
use crate::stage::Stage;
use crate::texture::{EnvironmentMap, Texture};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-frame uniforms. Everything is packed into `vec4`s to keep the WGSL
/// layout trivial.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlobUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of `model`.
    pub normal_matrix: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    /// Position frequency, position strength, small wave frequency, small wave strength.
    pub shape: [f32; 4],
    /// Time frequency, small wave time frequency, elapsed time, highest env mip.
    pub timing: [f32; 4],
    /// Roughness, metalness, environment intensity, transmission.
    pub surface: [f32; 4],
    /// Clearcoat, clearcoat roughness, flat shading flag, unused.
    pub coat: [f32; 4],
}

impl BlobUniforms {
    pub fn new(stage: &Stage, camera: &Camera, aspect: f32, env_mip_levels: u32) -> Self {
        let model = Mat4::from_rotation_y(stage.blob.rotation_y);
        let normal_matrix = model.inverse().transpose();
        let shape = &stage.blob.shape;
        let material = &stage.blob.material;

        Self {
            view_proj: camera.view_projection(aspect).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            shape: [
                shape.position_frequency,
                shape.position_strength,
                shape.small_wave_position_frequency,
                shape.small_wave_position_strength,
            ],
            timing: [
                TIME_FREQUENCY,
                SMALL_WAVE_TIME_FREQUENCY,
                stage.time,
                env_mip_levels.saturating_sub(1) as f32,
            ],
            surface: [
                material.roughness,
                material.metalness,
                material.env_map_intensity,
                material.transmission,
            ],
            coat: [
                material.clearcoat,
                material.clearcoat_roughness,
                if material.flat_shading { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

/// GPU data the blob needs, gathered once loading is done.
pub struct BlobResources {
    pub mesh: Mesh,
    pub environment: EnvironmentMap,
    /// Gradient textures keyed by material map name.
    pub gradients: HashMap<&'static str, Texture>,
}

pub struct BlobPass {
    pipeline: wgpu::RenderPipeline,
    wireframe_pipeline: Option<wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    env_bind_group: wgpu::BindGroup,
    gradient_bind_groups: HashMap<&'static str, wgpu::BindGroup>,
    fallback_gradient: wgpu::BindGroup,
    mesh: Mesh,
    env_mip_levels: u32,
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
    warned_wireframe: Cell<bool>,
}

impl BlobPass {
    pub fn new(gpu: &GpuContext, resources: BlobResources) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blob Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blob.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blob Uniforms"),
            size: std::mem::size_of::<BlobUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blob Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blob Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Rgba32Float is only guaranteed sampleable without filtering.
        let env_layout = texture_layout(device, "Environment Layout", false);
        let env_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment Bind Group"),
            layout: &env_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&resources.environment.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&resources.environment.sampler),
                },
            ],
        });

        let gradient_layout = texture_layout(device, "Gradient Layout", true);
        let gradient_bind_groups = resources
            .gradients
            .iter()
            .map(|(key, texture)| (*key, gradient_bind_group(device, &gradient_layout, texture)))
            .collect();
        let white = Texture::from_rgba(gpu, &[255, 255, 255, 255], 1, 1, "Default Gradient");
        let fallback_gradient = gradient_bind_group(device, &gradient_layout, &white);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blob Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &env_layout, &gradient_layout],
            push_constant_ranges: &[],
        });

        let pipeline = create_pipeline(gpu, &pipeline_layout, &shader, wgpu::PolygonMode::Fill);
        let wireframe_pipeline = gpu
            .supports_wireframe()
            .then(|| create_pipeline(gpu, &pipeline_layout, &shader, wgpu::PolygonMode::Line));

        let depth_view = create_depth_view(gpu);

        log::debug!(
            "blob pass ready: {} indices, {} gradients, {} env mips",
            resources.mesh.index_count,
            resources.gradients.len(),
            resources.environment.mip_levels
        );

        Self {
            pipeline,
            wireframe_pipeline,
            uniform_buffer,
            uniform_bind_group,
            env_bind_group,
            gradient_bind_groups,
            fallback_gradient,
            mesh: resources.mesh,
            env_mip_levels: resources.environment.mip_levels,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
            warned_wireframe: Cell::new(false),
        }
    }

    fn pipeline_for(&self, wireframe: bool) -> &wgpu::RenderPipeline {
        if !wireframe {
            return &self.pipeline;
        }
        match &self.wireframe_pipeline {
            Some(pipeline) => pipeline,
            None => {
                if !self.warned_wireframe.replace(true) {
                    log::warn!("adapter lacks line polygon mode; drawing wireframe presets filled");
                }
                &self.pipeline
            }
        }
    }
}

impl RenderNode for BlobPass {
    fn execute(&self, ctx: &mut RenderContext, target: &wgpu::TextureView) {
        let stage = ctx.stage;
        let uniforms = BlobUniforms::new(stage, ctx.camera, ctx.gpu.aspect(), self.env_mip_levels);
        ctx.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let gradient = self
            .gradient_bind_groups
            .get(stage.blob.material.map)
            .unwrap_or(&self.fallback_gradient);

        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blob Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(stage.background.to_linear().to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(self.pipeline_for(stage.blob.material.wireframe));
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &self.env_bind_group, &[]);
        pass.set_bind_group(2, gradient, &[]);
        pass.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(self.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.mesh.index_count, 0, 0..1);
    }

    fn resize(&mut self, gpu: &GpuContext) {
        if self.depth_size != (gpu.width(), gpu.height()) {
            self.depth_view = create_depth_view(gpu);
            self.depth_size = (gpu.width(), gpu.height());
        }
    }
}

fn texture_layout(device: &wgpu::Device, label: &str, filterable: bool) -> wgpu::BindGroupLayout {
    let sampler = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(sampler),
                count: None,
            },
        ],
    })
}

fn gradient_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Gradient Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    })
}

fn create_pipeline(
    gpu: &GpuContext,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    polygon_mode: wgpu::PolygonMode,
) -> wgpu::RenderPipeline {
    let label = match polygon_mode {
        wgpu::PolygonMode::Line => "Blob Wireframe Pipeline",
        _ => "Blob Pipeline",
    };
    gpu.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
}

fn create_depth_view(gpu: &GpuContext) -> wgpu::TextureView {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Blob Depth Texture"),
        size: wgpu::Extent3d {
            width: gpu.width(),
            height: gpu.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use glam::Vec3;

    #[test]
    fn uniforms_carry_preset_and_clock() {
        let catalog = Catalog::builtin();
        let mut stage = Stage::new(&catalog);
        stage.time = 2.5;
        let camera = Camera::new();
        let uniforms = BlobUniforms::new(&stage, &camera, 16.0 / 9.0, 11);

        let first = catalog.preset(0);
        assert_eq!(uniforms.shape[0], first.shape.position_frequency);
        assert_eq!(uniforms.shape[3], first.shape.small_wave_position_strength);
        assert_eq!(uniforms.timing, [TIME_FREQUENCY, SMALL_WAVE_TIME_FREQUENCY, 2.5, 10.0]);
        assert_eq!(uniforms.surface[0], first.material.roughness);
        assert_eq!(uniforms.camera_pos, [0.0, 0.0, 5.0, 1.0]);
    }

    #[test]
    fn model_spins_about_vertical_axis() {
        let catalog = Catalog::builtin();
        let mut stage = Stage::new(&catalog);
        stage.blob.rotation_y = std::f32::consts::FRAC_PI_2;
        let uniforms = BlobUniforms::new(&stage, &Camera::new(), 1.0, 1);

        let model = Mat4::from_cols_array_2d(&uniforms.model);
        let rotated = model.transform_point3(Vec3::X);
        assert!((rotated - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        assert_eq!(uniforms.timing[3], 0.0);

        // Pure rotation: the normal matrix equals the model matrix.
        let normal = Mat4::from_cols_array_2d(&uniforms.normal_matrix);
        assert!(normal.abs_diff_eq(model, 1e-5));
    }

    #[test]
    fn flat_shading_flag_is_encoded() {
        let catalog = Catalog::builtin();
        let mut stage = Stage::new(&catalog);
        stage.blob.material.flat_shading = true;
        let uniforms = BlobUniforms::new(&stage, &Camera::new(), 1.0, 1);
        assert_eq!(uniforms.coat[2], 1.0);
    }
}
