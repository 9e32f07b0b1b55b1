//! Asset loading: font atlases, the asset manifest and a background loader.
//!
//! Decoding happens on a worker thread so the loader overlay keeps
//! animating. The main thread drains finished items with
//! [`AssetLoader::poll`] and uploads them to the GPU itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use fontdue::{Font, FontSettings};
use image::{Rgba32FImage, RgbaImage};

use crate::error::AssetError;
use crate::gpu::GpuContext;
use crate::mesh::RawGeometry;

/// Information about a single glyph in the font atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphInfo {
    /// UV coordinates in the atlas (x, y, width, height) normalized to [0, 1].
    pub uv: [f32; 4],
    /// Size of the glyph in pixels.
    pub width: u32,
    pub height: u32,
    /// Offset from the cursor position to where the glyph should be drawn.
    pub offset_x: f32,
    pub offset_y: f32,
    /// How far to advance the cursor after this glyph.
    pub advance: f32,
}

/// Place rectangles left to right in rows, growing the atlas until they fit.
///
/// Returns the atlas size and the top-left corner of each rectangle.
pub fn pack_rows(sizes: &[(u32, u32)], padding: u32) -> (u32, u32, Vec<(u32, u32)>) {
    let mut atlas_width = 256u32;
    let mut atlas_height = 256u32;

    loop {
        let mut x = padding;
        let mut y = padding;
        let mut row_height = 0u32;
        let mut positions = Vec::with_capacity(sizes.len());
        let mut fits = true;

        for &(w, h) in sizes {
            if x + w + padding > atlas_width {
                x = padding;
                y += row_height + padding;
                row_height = 0;
            }
            if x + w + padding > atlas_width || y + h + padding > atlas_height {
                fits = false;
                break;
            }
            positions.push((x, y));
            x += w + padding;
            row_height = row_height.max(h);
        }

        if fits {
            return (atlas_width, atlas_height, positions);
        }

        // Double the smaller dimension
        if atlas_width <= atlas_height {
            atlas_width *= 2;
        } else {
            atlas_height *= 2;
        }
    }
}

/// Glyph lookup and vertical metrics shared by everything that lays out text.
pub trait GlyphMetrics {
    /// Get glyph info for a character.
    fn glyph(&self, c: char) -> Option<&GlyphInfo>;

    /// Pixel size the glyphs were rasterized at.
    fn size(&self) -> f32;

    fn ascent(&self) -> f32;

    /// Distance below the baseline, negative.
    fn descent(&self) -> f32;

    /// Advance used for characters the font lacks.
    fn fallback_advance(&self) -> f32 {
        self.size() * 0.5
    }

    /// Measure the width of a string in atlas pixels.
    fn measure(&self, text: &str) -> f32 {
        text.chars()
            .map(|c| match self.glyph(c) {
                Some(g) => g.advance,
                None => self.fallback_advance(),
            })
            .sum()
    }
}

/// One glyph placed on a line, in atlas pixels.
///
/// The pen starts at the origin on the baseline and `y` points up, so `min`
/// is the bottom-left corner. `uv_min` is the atlas corner matching the
/// glyph's top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphQuad {
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

/// Lay `text` out on a single line. Empty glyphs such as spaces only advance
/// the pen; characters missing from the font advance by half an em.
pub fn layout_line<M: GlyphMetrics + ?Sized>(font: &M, text: &str) -> Vec<GlyphQuad> {
    let mut quads = Vec::with_capacity(text.len());
    let mut pen = 0.0;
    for c in text.chars() {
        let Some(glyph) = font.glyph(c) else {
            pen += font.fallback_advance();
            continue;
        };
        if glyph.width > 0 && glyph.height > 0 {
            let x = pen + glyph.offset_x;
            let y = glyph.offset_y;
            quads.push(GlyphQuad {
                min: [x, y],
                max: [x + glyph.width as f32, y + glyph.height as f32],
                uv_min: [glyph.uv[0], glyph.uv[1]],
                uv_max: [glyph.uv[0] + glyph.uv[2], glyph.uv[1] + glyph.uv[3]],
            });
        }
        pen += glyph.advance;
    }
    quads
}

/// Rasterized glyphs on the CPU, ready to upload.
#[derive(Clone, Debug)]
pub struct GlyphSheet {
    pub width: u32,
    pub height: u32,
    /// One coverage byte per pixel.
    pub pixels: Vec<u8>,
    glyphs: HashMap<char, GlyphInfo>,
    size: f32,
    ascent: f32,
    descent: f32,
    line_height: f32,
}

impl GlyphSheet {
    /// Rasterize the printable ASCII range of `font` at `size` pixels.
    pub fn rasterize(font: &Font, size: f32) -> Self {
        let rasterized: Vec<(char, fontdue::Metrics, Vec<u8>)> = (32u8..=126u8)
            .map(char::from)
            .map(|c| {
                let (metrics, bitmap) = font.rasterize(c, size);
                (c, metrics, bitmap)
            })
            .collect();

        let sizes: Vec<(u32, u32)> = rasterized
            .iter()
            .map(|(_, m, _)| (m.width as u32, m.height as u32))
            .collect();
        let (width, height, positions) = pack_rows(&sizes, 1);

        let mut pixels = vec![0u8; (width * height) as usize];
        let mut glyphs = HashMap::with_capacity(rasterized.len());

        for ((c, metrics, bitmap), (x, y)) in rasterized.iter().zip(positions) {
            let glyph_w = metrics.width as u32;
            let glyph_h = metrics.height as u32;

            for gy in 0..glyph_h {
                let src = (gy * glyph_w) as usize;
                let dst = ((y + gy) * width + x) as usize;
                pixels[dst..dst + glyph_w as usize]
                    .copy_from_slice(&bitmap[src..src + glyph_w as usize]);
            }

            glyphs.insert(
                *c,
                GlyphInfo {
                    uv: [
                        x as f32 / width as f32,
                        y as f32 / height as f32,
                        glyph_w as f32 / width as f32,
                        glyph_h as f32 / height as f32,
                    ],
                    width: glyph_w,
                    height: glyph_h,
                    offset_x: metrics.xmin as f32,
                    offset_y: metrics.ymin as f32,
                    advance: metrics.advance_width,
                },
            );
        }

        let (ascent, descent, line_height) = match font.horizontal_line_metrics(size) {
            Some(m) => (m.ascent, m.descent, m.new_line_size),
            None => (size * 0.8, -size * 0.2, size * 1.2),
        };

        Self {
            width,
            height,
            pixels,
            glyphs,
            size,
            ascent,
            descent,
            line_height,
        }
    }
}

/// A font atlas containing pre-rasterized glyphs on the GPU.
pub struct FontAtlas {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    glyphs: HashMap<char, GlyphInfo>,
    size: f32,
    ascent: f32,
    descent: f32,
    line_height: f32,
}

impl FontAtlas {
    pub fn upload(gpu: &GpuContext, sheet: GlyphSheet) -> Self {
        let extent = wgpu::Extent3d {
            width: sheet.width,
            height: sheet.height,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Font Atlas"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &sheet.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(sheet.width),
                rows_per_image: Some(sheet.height),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Font Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            glyphs: sheet.glyphs,
            size: sheet.size,
            ascent: sheet.ascent,
            descent: sheet.descent,
            line_height: sheet.line_height,
        }
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }
}

impl GlyphMetrics for FontAtlas {
    fn glyph(&self, c: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&c)
    }

    fn size(&self) -> f32 {
        self.size
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }

    fn descent(&self) -> f32 {
        self.descent
    }
}

/// Where the showcase finds its files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetManifest {
    /// Equirectangular Radiance HDR used for lighting.
    pub environment: PathBuf,
    /// Directory holding one `<map>.png` per gradient key.
    pub gradients_dir: PathBuf,
    /// TTF/OTF used for labels and the loader counter. DejaVu Sans is
    /// embedded as a fallback.
    pub font: PathBuf,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            environment: PathBuf::from("assets/studio_small_08_1k.hdr"),
            gradients_dir: PathBuf::from("assets/gradients"),
            font: PathBuf::from("assets/fonts/label.ttf"),
        }
    }
}

impl AssetManifest {
    pub fn gradient_path(&self, key: &str) -> PathBuf {
        self.gradients_dir.join(format!("{key}.png"))
    }
}

/// Pixel size glyphs are rasterized at. Labels and overlay text scale from it.
pub const FONT_RASTER_SIZE: f32 = 96.0;

/// DejaVu Sans, used when the manifest font cannot be read or parsed.
const EMBEDDED_FONT: &[u8] = include_bytes!("fonts/DejaVuSans.ttf");
const EMBEDDED_FONT_NAME: &str = "<embedded DejaVu Sans>";

/// One unit of work for the loader thread.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Environment(PathBuf),
    Gradient { key: &'static str, path: PathBuf },
    Font(PathBuf),
    Blob { radius: f32, detail: u32 },
}

impl Request {
    fn describe(&self) -> String {
        match self {
            Request::Environment(path) | Request::Font(path) => path.display().to_string(),
            Request::Gradient { path, .. } => path.display().to_string(),
            Request::Blob { radius, detail } => format!("icosphere r={radius} detail={detail}"),
        }
    }
}

/// Decoded, GPU-ready-on-the-CPU data.
pub enum Asset {
    Environment(Rgba32FImage),
    Gradient {
        key: &'static str,
        image: RgbaImage,
    },
    Font(GlyphSheet),
    Blob(RawGeometry),
}

/// The outcome of one request.
pub struct Loaded {
    pub request: Request,
    pub result: Result<Asset, AssetError>,
}

fn read(path: &Path) -> Result<Vec<u8>, AssetError> {
    std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode(path: &Path) -> Result<image::DynamicImage, AssetError> {
    let bytes = read(path)?;
    image::load_from_memory(&bytes).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })
}

fn load(request: &Request) -> Result<Asset, AssetError> {
    match request {
        Request::Environment(path) => Ok(Asset::Environment(decode(path)?.into_rgba32f())),
        Request::Gradient { key, path } => Ok(Asset::Gradient {
            key: *key,
            image: decode(path)?.into_rgba8(),
        }),
        Request::Font(path) => {
            let font = match read(path).and_then(|bytes| parse_font(bytes, path)) {
                Ok(font) => font,
                Err(e) => {
                    log::warn!("{e}; using the embedded font");
                    parse_font(EMBEDDED_FONT, Path::new(EMBEDDED_FONT_NAME))?
                }
            };
            Ok(Asset::Font(GlyphSheet::rasterize(&font, FONT_RASTER_SIZE)))
        }
        Request::Blob { radius, detail } => {
            Ok(Asset::Blob(RawGeometry::icosphere(*radius, *detail)))
        }
    }
}

fn parse_font<B>(bytes: B, path: &Path) -> Result<Font, AssetError>
where
    B: std::ops::Deref<Target = [u8]>,
{
    Font::from_bytes(bytes, FontSettings::default()).map_err(|reason| AssetError::Font {
        path: path.to_path_buf(),
        reason,
    })
}

/// Counts finished items and reports completion exactly once.
///
/// Failed items count as finished.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadingManager {
    total: usize,
    loaded: usize,
    failed: usize,
    notified: bool,
}

impl LoadingManager {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn item_loaded(&mut self) {
        self.loaded += 1;
    }

    pub fn item_failed(&mut self) {
        self.failed += 1;
    }

    pub fn finished(&self) -> usize {
        self.loaded + self.failed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.finished() >= self.total
    }

    /// `true` the first time this is called after everything finished.
    pub fn take_completion(&mut self) -> bool {
        if self.notified || !self.is_complete() {
            return false;
        }
        self.notified = true;
        true
    }
}

/// Runs requests on a worker thread and hands results back in order.
pub struct AssetLoader {
    rx: Receiver<Loaded>,
    manager: LoadingManager,
}

impl AssetLoader {
    pub fn spawn(requests: Vec<Request>) -> Self {
        let (tx, rx) = mpsc::channel();
        let manager = LoadingManager::new(requests.len());
        log::info!("loading {} assets", requests.len());

        thread::spawn(move || {
            for request in requests {
                let result = load(&request);
                if tx.send(Loaded { request, result }).is_err() {
                    break;
                }
            }
        });

        Self { rx, manager }
    }

    /// Drain everything the worker has finished so far.
    pub fn poll(&mut self) -> Vec<Loaded> {
        let mut done = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(item) => {
                    match &item.result {
                        Ok(_) => {
                            log::info!("loaded {}", item.request.describe());
                            self.manager.item_loaded();
                        }
                        Err(e) => {
                            log::warn!("{e}; using a fallback");
                            self.manager.item_failed();
                        }
                    }
                    done.push(item);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let missing = self.manager.total() - self.manager.finished();
                    if missing > 0 {
                        log::error!("asset worker stopped with {missing} items outstanding");
                        for _ in 0..missing {
                            self.manager.item_failed();
                        }
                    }
                    break;
                }
            }
        }
        done
    }

    pub fn manager(&self) -> &LoadingManager {
        &self.manager
    }

    /// `true` once, on the poll after the last item finished.
    pub fn take_completion(&mut self) -> bool {
        let fired = self.manager.take_completion();
        if fired {
            log::info!(
                "assets ready ({} of {} failed)",
                self.manager.failed(),
                self.manager.total()
            );
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn drain(loader: &mut AssetLoader) -> Vec<Loaded> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut all = Vec::new();
        while !loader.manager().is_complete() && Instant::now() < deadline {
            all.extend(loader.poll());
            thread::sleep(Duration::from_millis(5));
        }
        all
    }

    struct Monospace(HashMap<char, GlyphInfo>);

    impl GlyphMetrics for Monospace {
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

    fn monospace() -> Monospace {
        let solid = GlyphInfo {
            uv: [0.5, 0.25, 0.25, 0.5],
            width: 6,
            height: 8,
            offset_x: 1.0,
            offset_y: -1.0,
            advance: 8.0,
        };
        let space = GlyphInfo {
            width: 0,
            height: 0,
            ..solid
        };
        Monospace(HashMap::from([('A', solid), (' ', space)]))
    }

    #[test]
    fn line_layout_advances_pen_and_skips_blanks() {
        let font = monospace();
        let quads = layout_line(&font, "A A");
        assert_eq!(quads.len(), 2);
        assert_eq!(quads[0].min, [1.0, -1.0]);
        assert_eq!(quads[0].max, [7.0, 7.0]);
        assert_eq!(quads[1].min[0], 17.0);
        assert_eq!(quads[0].uv_min, [0.5, 0.25]);
        assert_eq!(quads[0].uv_max, [0.75, 0.75]);
    }

    #[test]
    fn missing_glyphs_advance_half_an_em() {
        let font = monospace();
        assert_eq!(font.measure("A?A"), 21.0);
        let quads = layout_line(&font, "?A");
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].min[0], 6.0);
    }

    #[test]
    fn rows_wrap_and_atlas_grows() {
        let (w, h, positions) = pack_rows(&[(100, 10), (100, 20), (100, 5)], 1);
        assert_eq!((w, h), (256, 256));
        assert_eq!(positions, vec![(1, 1), (102, 1), (1, 22)]);

        let (w, h, positions) = pack_rows(&[(300, 300); 2], 0);
        assert!(w >= 600 || h >= 600);
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn completion_fires_once_even_with_failures() {
        let mut manager = LoadingManager::new(2);
        manager.item_loaded();
        assert!(!manager.take_completion());
        manager.item_failed();
        assert!(manager.is_complete());
        assert!(manager.take_completion());
        assert!(!manager.take_completion());
        assert_eq!(manager.failed(), 1);
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let mut manager = LoadingManager::new(0);
        assert!(manager.take_completion());
    }

    #[test]
    fn gradient_path_uses_map_key() {
        let manifest = AssetManifest::default();
        assert_eq!(
            manifest.gradient_path("lucky-day"),
            PathBuf::from("assets/gradients/lucky-day.png")
        );
    }

    #[test]
    fn missing_font_falls_back_to_embedded() {
        let request = Request::Font(AssetManifest::default().font);
        let Ok(Asset::Font(sheet)) = load(&request) else {
            panic!("expected the embedded font to load");
        };
        assert_eq!(sheet.size, FONT_RASTER_SIZE);
        assert!(sheet.glyphs.contains_key(&'A'));
        assert!(sheet.glyphs[&'W'].advance > 0.0);
        assert!(sheet.ascent > 0.0);
        assert!(sheet.pixels.iter().any(|&p| p > 0));
    }

    #[test]
    fn unparsable_font_falls_back_to_embedded() {
        let path = std::env::temp_dir().join("blobshow-not-a-font.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();
        let loaded = load(&Request::Font(path.clone()));
        let _ = std::fs::remove_file(&path);
        assert!(matches!(loaded, Ok(Asset::Font(sheet)) if sheet.glyphs.contains_key(&'0')));
    }

    #[test]
    fn loader_reports_missing_files_and_builds_geometry() {
        let missing = PathBuf::from("does/not/exist.png");
        let mut loader = AssetLoader::spawn(vec![
            Request::Gradient {
                key: "cd",
                path: missing.clone(),
            },
            Request::Blob {
                radius: 1.0,
                detail: 1,
            },
            Request::Font(PathBuf::from("does/not/exist.ttf")),
        ]);

        let loaded = drain(&mut loader);
        assert_eq!(loaded.len(), 3);
        assert!(matches!(
            &loaded[0].result,
            Err(AssetError::Io { path, .. }) if *path == missing
        ));
        assert!(matches!(&loaded[1].result, Ok(Asset::Blob(g)) if g.triangle_count() == 80));
        assert!(matches!(&loaded[2].result, Ok(Asset::Font(_))));
        assert_eq!(loader.manager().failed(), 1);
        assert!(loader.take_completion());
        assert!(!loader.take_completion());
    }
}
