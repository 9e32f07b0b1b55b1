use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use image::{Rgba32FImage, RgbaImage};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowAttributes, WindowId};

use crate::assets::{Asset, AssetLoader, AssetManifest, FontAtlas, Request};
use crate::blob_pass::{BlobPass, BlobResources};
use crate::camera::Camera;
use crate::catalog::Catalog;
use crate::color::Color;
use crate::draw2d::Draw2d;
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::label_pass::LabelPass;
use crate::loader_overlay::LoaderOverlay;
use crate::mesh::RawGeometry;
use crate::render_graph::RenderGraph;
use crate::sequencer::TransitionSettings;
use crate::showcase::Showcase;
use crate::texture::{EnvironmentMap, Texture, procedural_gradient, studio_environment};

/// Shape of the blob's base mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlobSettings {
    pub radius: f32,
    /// Icosphere subdivision level.
    pub detail: u32,
}

impl Default for BlobSettings {
    fn default() -> Self {
        Self {
            radius: 1.8,
            detail: 200,
        }
    }
}

/// Configuration for the showcase window.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub assets: AssetManifest,
    pub transition: TransitionSettings,
    pub blob: BlobSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Blobshow".to_string(),
            width: 1280,
            height: 720,
            assets: AssetManifest::default(),
            transition: TransitionSettings::default(),
            blob: BlobSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn assets(mut self, assets: AssetManifest) -> Self {
        self.assets = assets;
        self
    }

    pub fn transition(mut self, transition: TransitionSettings) -> Self {
        self.transition = transition;
        self
    }

    pub fn blob(mut self, blob: BlobSettings) -> Self {
        self.blob = blob;
        self
    }

    /// Every file and mesh the scene needs, in load order.
    fn requests(&self, catalog: &Catalog) -> Vec<Request> {
        let mut requests = vec![Request::Environment(self.assets.environment.clone())];
        requests.extend(catalog.gradient_keys().into_iter().map(|key| Request::Gradient {
            key,
            path: self.assets.gradient_path(key),
        }));
        requests.push(Request::Font(self.assets.font.clone()));
        requests.push(Request::Blob {
            radius: self.blob.radius,
            detail: self.blob.detail,
        });
        requests
    }
}

/// Run the showcase with default settings.
pub fn run() -> anyhow::Result<()> {
    run_with_config(AppConfig::default())
}

/// Run the showcase with custom configuration.
///
/// # Example
/// ```ignore
/// blobshow::run_with_config(AppConfig::new().title("Blobs").size(1920, 1080))?;
/// ```
pub fn run_with_config(config: AppConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("creating event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ShowcaseApp {
        state: AppState::Pending { config },
        error: None,
    };
    event_loop.run_app(&mut app).context("running event loop")?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Longest step, in seconds, the tweens and overlay advance by in one frame.
pub const MAX_FRAME_DT: f32 = 0.1;

/// Seconds to advance for a frame that took `elapsed`.
///
/// Stalls such as the scene upload after loading are capped so a running
/// transition slows down instead of jumping to its end.
pub fn frame_delta(elapsed: Duration) -> f32 {
    elapsed.as_secs_f32().min(MAX_FRAME_DT)
}

/// Decoded assets held until the whole batch has finished.
#[derive(Default)]
struct PendingAssets {
    environment: Option<Rgba32FImage>,
    gradients: HashMap<&'static str, RgbaImage>,
    font: Option<Arc<FontAtlas>>,
    geometry: Option<RawGeometry>,
}

struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    draw_2d: Draw2d,
    camera: Camera,
    input: Input,
    showcase: Showcase,
    overlay: LoaderOverlay,
    loader: AssetLoader,
    pending: PendingAssets,
    blob: BlobSettings,
    graph: RenderGraph,
    /// Set on the first frame after loading completes.
    scene_start: Option<Instant>,
    last_frame: Instant,
}

enum AppState {
    Pending { config: AppConfig },
    Running(Box<Running>),
}

struct ShowcaseApp {
    state: AppState,
    /// First fatal error; returned once the event loop exits.
    error: Option<anyhow::Error>,
}

impl ShowcaseApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error.get_or_insert(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for ShowcaseApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending { config } = &self.state else {
            return;
        };
        match Running::start(event_loop, config) {
            Ok(running) => self.state = AppState::Running(Box::new(running)),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(running) = &mut self.state else {
            return;
        };

        running.input.handle_event(&event);

        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => {
                running.gpu.resize(size.width, size.height);
                running.graph.resize(&running.gpu);
                Ok(())
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                running.gpu.set_scale_factor(scale_factor);
                Ok(())
            }
            WindowEvent::RedrawRequested => running.frame(event_loop),
            _ => Ok(()),
        };

        if let Err(e) = result {
            self.fail(event_loop, e);
        }
    }
}

impl Running {
    fn start(event_loop: &ActiveEventLoop, config: &AppConfig) -> anyhow::Result<Self> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .context("creating window")?,
        );
        let gpu = GpuContext::new(window.clone()).context("initialising GPU")?;
        window.request_redraw();

        let catalog = Catalog::builtin();
        let loader = AssetLoader::spawn(config.requests(&catalog));

        let draw_2d = Draw2d::new(&gpu);
        let graph = RenderGraph::empty();
        let now = Instant::now();

        Ok(Self {
            window,
            gpu,
            draw_2d,
            camera: Camera::new(),
            input: Input::new(),
            showcase: Showcase::new(catalog, config.transition),
            overlay: LoaderOverlay::new(),
            loader,
            pending: PendingAssets::default(),
            blob: config.blob,
            graph,
            scene_start: None,
            last_frame: now,
        })
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = frame_delta(now.duration_since(self.last_frame));
        self.last_frame = now;

        if self.input.key_pressed(KeyCode::Escape) {
            event_loop.exit();
            return Ok(());
        }

        for &delta in self.input.wheel_events() {
            self.showcase.scroll(delta);
        }

        self.poll_assets();

        self.showcase.advance(dt);
        self.overlay.update(dt);
        if let Some(start) = self.scene_start {
            self.showcase.set_time(start.elapsed().as_secs_f32());
        }

        self.draw_2d.clear();
        self.overlay.draw(
            &mut self.draw_2d,
            self.gpu.width() as f32,
            self.gpu.height() as f32,
        );

        let draw_2d = &self.draw_2d;
        self.graph
            .execute_with_ui(&self.gpu, self.showcase.stage(), &self.camera, |gpu, pass| {
                draw_2d.render(gpu, pass);
            })
            .context("presenting frame")?;

        self.input.begin_frame();
        self.window.request_redraw();
        Ok(())
    }

    fn poll_assets(&mut self) {
        for loaded in self.loader.poll() {
            // Failures were logged by the loader; fallbacks are chosen below.
            let Ok(asset) = loaded.result else {
                continue;
            };
            match asset {
                Asset::Environment(image) => self.pending.environment = Some(image),
                Asset::Gradient { key, image } => {
                    self.pending.gradients.insert(key, image);
                }
                Asset::Font(sheet) => {
                    let atlas = Arc::new(FontAtlas::upload(&self.gpu, sheet));
                    self.draw_2d.set_font(&self.gpu, atlas.clone());
                    self.pending.font = Some(atlas);
                }
                Asset::Blob(geometry) => self.pending.geometry = Some(geometry),
            }
        }

        if self.loader.take_completion() {
            let pending = std::mem::take(&mut self.pending);
            self.graph = self.build_scene(pending);
            self.scene_start = Some(Instant::now());
        }
    }

    fn build_scene(&self, pending: PendingAssets) -> RenderGraph {
        let catalog = self.showcase.catalog();

        let environment = pending.environment.unwrap_or_else(|| {
            log::warn!("no environment map; lighting with a procedural studio");
            studio_environment()
        });

        let mut images = pending.gradients;
        let gradients = catalog
            .gradient_keys()
            .into_iter()
            .map(|key| {
                let image = images.remove(key).unwrap_or_else(|| {
                    let tint = catalog
                        .iter()
                        .find(|p| p.material.map == key)
                        .map_or(Color::WHITE, |p| p.background);
                    log::warn!("gradient '{key}' missing; using a procedural ramp");
                    procedural_gradient(tint)
                });
                (key, Texture::from_image(&self.gpu, &image, key))
            })
            .collect();

        let geometry = pending.geometry.unwrap_or_else(|| {
            log::warn!("blob mesh was not built off-thread; building it now");
            RawGeometry::icosphere(self.blob.radius, self.blob.detail)
        });

        let resources = BlobResources {
            mesh: geometry.upload(&self.gpu),
            environment: EnvironmentMap::new(&self.gpu, &environment),
            gradients,
        };
        let builder = RenderGraph::builder().node(BlobPass::new(&self.gpu, resources));

        match pending.font {
            Some(font) => {
                let texts: Vec<&str> = catalog.iter().map(|p| p.name).collect();
                builder.node(LabelPass::new(&self.gpu, font, &texts)).build()
            }
            None => {
                log::warn!("no label font; preset names will not be shown");
                builder.build()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_delta_passes_short_frames_through() {
        assert!((frame_delta(Duration::from_millis(16)) - 0.016).abs() < 1e-6);
        assert_eq!(frame_delta(Duration::ZERO), 0.0);
    }

    #[test]
    fn long_frames_do_not_finish_a_transition() {
        let mut show = Showcase::new(Catalog::builtin(), TransitionSettings::default());
        assert!(show.scroll(1.0));
        let dt = frame_delta(Duration::from_millis(1500));
        assert_eq!(dt, MAX_FRAME_DT);

        show.advance(dt);
        assert!(show.is_animating());
        assert_eq!(show.current(), 0);
        assert!(!show.scroll(1.0));
    }
}
