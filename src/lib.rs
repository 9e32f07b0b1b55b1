//! # Blobshow
//!
//! **A scroll-driven showcase of morphing 3D blobs.**
//!
//! A displaced, environment-lit sphere cycles through a fixed catalogue of
//! looks. Each mouse-wheel step starts a one-second transition: the preset's
//! name slides in while the previous one slides out, the blob spins a full
//! turn, and the background, displacement and material blend toward the new
//! preset. Input that arrives mid-transition is ignored.
//!
//! ## Quick Start
//!
//! ```no_run
//! fn main() -> anyhow::Result<()> {
//!     env_logger::init();
//!     blobshow::run_with_config(blobshow::AppConfig::new().title("Blobs").size(1280, 720))
//! }
//! ```
//!
//! ## Layout
//!
//! - [`Catalog`] holds the presets, [`Sequencer`] decides which one comes
//!   next, and [`Showcase`] turns each accepted scroll into a batch of
//!   tweens over the [`Stage`].
//! - The renderer reads the stage every frame through a [`RenderGraph`]
//!   of a [`BlobPass`] and a [`LabelPass`], with a [`Draw2d`] overlay for
//!   the loading screen.
//!
//! Everything above the GPU layer is plain data and runs without a window,
//! so transitions can be driven directly:
//!
//! ```
//! use blobshow::{Catalog, Showcase, TransitionSettings};
//!
//! let mut show = Showcase::new(Catalog::builtin(), TransitionSettings::default());
//! assert!(show.scroll(1.0));
//! for _ in 0..4 {
//!     show.advance(0.25);
//! }
//! assert_eq!(show.current(), 1);
//! assert!(!show.is_animating());
//! ```

mod app;
mod assets;
mod blob_pass;
mod camera;
mod catalog;
mod color;
mod draw2d;
mod error;
mod gpu;
mod input;
mod label_pass;
mod loader_overlay;
mod mesh;
mod render_graph;
mod sequencer;
mod showcase;
mod stage;
mod texture;
mod tween;

pub use app::{AppConfig, BlobSettings, MAX_FRAME_DT, frame_delta, run, run_with_config};
pub use assets::{
    Asset, AssetLoader, AssetManifest, FONT_RASTER_SIZE, FontAtlas, GlyphInfo, GlyphMetrics,
    GlyphQuad, GlyphSheet, Loaded, LoadingManager, Request, layout_line,
};
pub use blob_pass::{BlobPass, BlobResources, BlobUniforms};
pub use camera::Camera;
pub use catalog::{
    Catalog, MaterialParams, PRESETS, Preset, SMALL_WAVE_TIME_FREQUENCY, ShapeParams,
    TIME_FREQUENCY,
};
pub use color::Color;
pub use draw2d::{Draw2d, Vertex2d};
pub use error::{AssetError, CatalogError, GpuError};
pub use gpu::GpuContext;
pub use input::{Input, wheel_delta_y};
pub use label_pass::{LabelMesh, LabelPass, LabelUniforms, LabelVertex, label_size};
pub use loader_overlay::{LoaderOverlay, LoaderPhase};
pub use mesh::{Mesh, RawGeometry, Transform, Vertex3d};
pub use render_graph::{RenderContext, RenderGraph, RenderGraphBuilder, RenderNode};
pub use sequencer::{Direction, Phase, Sequencer, Step, TransitionSettings, next_index};
pub use showcase::Showcase;
pub use stage::{BlobState, LABEL_DEPTH, Label, Stage, Wipe};
pub use texture::{EnvironmentMap, Texture, procedural_gradient, studio_environment};
pub use tween::{Easing, Tween, TweenEngine, TweenId};

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec3};
