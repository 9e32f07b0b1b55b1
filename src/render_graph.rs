use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::stage::Stage;

/// Context passed to each render node during execution.
pub struct RenderContext<'a> {
    pub gpu: &'a GpuContext,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub stage: &'a Stage,
    pub camera: &'a Camera,
}

/// A node in the render graph.
///
/// Nodes draw straight into the frame, in the order they were added. The
/// first node is expected to clear it.
pub trait RenderNode {
    /// Execute this node, rendering to the provided target view.
    fn execute(&self, ctx: &mut RenderContext, target: &wgpu::TextureView);

    /// Called after the surface changed size.
    fn resize(&mut self, _gpu: &GpuContext) {}
}

/// Chains render nodes and finishes each frame with a 2D overlay pass.
///
/// # Example
/// ```ignore
/// let mut graph = RenderGraph::builder()
///     .node(BlobPass::new(&gpu, resources))
///     .node(LabelPass::new(&gpu, font, labels))
///     .build();
///
/// // In render loop:
/// graph.execute_with_ui(&gpu, &stage, &camera, |gpu, pass| draw_2d.render(gpu, pass))?;
/// ```
pub struct RenderGraph {
    nodes: Vec<Box<dyn RenderNode>>,
}

#[derive(Default)]
pub struct RenderGraphBuilder {
    nodes: Vec<Box<dyn RenderNode>>,
}

impl RenderGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a render node to the graph.
    pub fn node<N: RenderNode + 'static>(mut self, node: N) -> Self {
        self.nodes.push(Box::new(node));
        self
    }

    pub fn build(self) -> RenderGraph {
        RenderGraph { nodes: self.nodes }
    }
}

impl RenderGraph {
    /// Create a new render graph builder.
    pub fn builder() -> RenderGraphBuilder {
        RenderGraphBuilder::new()
    }

    /// A graph with no nodes: frames show only the overlay.
    pub fn empty() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn resize(&mut self, gpu: &GpuContext) {
        for node in &mut self.nodes {
            node.resize(gpu);
        }
    }

    /// Render one frame and present it.
    ///
    /// With no nodes the overlay pass clears to the stage background first.
    /// A lost or outdated surface is reconfigured and the frame skipped;
    /// only unrecoverable surface errors are returned.
    pub fn execute_with_ui<F>(
        &self,
        gpu: &GpuContext,
        stage: &Stage,
        camera: &Camera,
        ui_fn: F,
    ) -> Result<(), wgpu::SurfaceError>
    where
        F: FnOnce(&GpuContext, &mut wgpu::RenderPass),
    {
        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("surface {e}; reconfiguring");
                gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out waiting for a surface texture; skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let screen_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("RenderGraph Encoder"),
            });

        {
            let mut ctx = RenderContext {
                gpu,
                encoder: &mut encoder,
                stage,
                camera,
            };
            for node in &self.nodes {
                node.execute(&mut ctx, &screen_view);
            }
        }

        // Render UI on top
        {
            let load = if self.nodes.is_empty() {
                wgpu::LoadOp::Clear(stage.background.to_linear().to_wgpu())
            } else {
                wgpu::LoadOp::Load
            };
            let mut ui_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("UI Overlay Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &screen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            ui_fn(gpu, &mut ui_pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
