use image::{Rgba, Rgba32FImage, RgbaImage};

use crate::color::Color;
use crate::gpu::GpuContext;

/// A GPU texture that can be bound to shaders.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw sRGB-encoded RGBA data.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Gradient maps are smooth ramps; filter them.
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    pub fn from_image(gpu: &GpuContext, image: &RgbaImage, label: &str) -> Self {
        let (width, height) = image.dimensions();
        Self::from_rgba(gpu, image.as_raw(), width, height, label)
    }
}

/// An equirectangular HDR environment with a prefiltered mip chain.
///
/// Rough surfaces read blurrier mips. `Rgba32Float` is not filterable on
/// every adapter, so the shader samples it with explicit levels and a
/// non-filtering sampler.
#[derive(Debug)]
pub struct EnvironmentMap {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub mip_levels: u32,
}

impl EnvironmentMap {
    pub fn new(gpu: &GpuContext, image: &Rgba32FImage) -> Self {
        use wgpu::util::DeviceExt;

        let chain = build_mip_chain(image);
        let (width, height) = image.dimensions();
        let data: Vec<f32> = chain
            .iter()
            .flat_map(|level| level.as_raw().iter().copied())
            .collect();

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some("Environment Map"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: chain.len() as u32,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&data),
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            mip_levels: chain.len() as u32,
        }
    }
}

/// Halve `image` repeatedly down to 1x1 with a 2x2 box filter. Level 0 is
/// the input itself. Radiance above 1.0 is kept.
pub fn build_mip_chain(image: &Rgba32FImage) -> Vec<Rgba32FImage> {
    let mut chain = vec![image.clone()];
    while let Some(last) = chain.last() {
        let (w, h) = last.dimensions();
        if w <= 1 && h <= 1 {
            break;
        }
        let next = downsample(last);
        chain.push(next);
    }
    chain
}

fn downsample(src: &Rgba32FImage) -> Rgba32FImage {
    let (w, h) = src.dimensions();
    Rgba32FImage::from_fn((w / 2).max(1), (h / 2).max(1), |x, y| {
        let x0 = (x * 2).min(w - 1);
        let y0 = (y * 2).min(h - 1);
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let mut sum = [0.0f32; 4];
        for (sx, sy) in [(x0, y0), (x1, y0), (x0, y1), (x1, y1)] {
            let p = src.get_pixel(sx, sy);
            for (acc, v) in sum.iter_mut().zip(p.0) {
                *acc += v;
            }
        }
        Rgba(sum.map(|v| v * 0.25))
    })
}

/// Stand-in for a missing gradient map: a ramp from a deep shade of `tint`
/// through the tint itself to a pale highlight.
pub fn procedural_gradient(tint: Color) -> RgbaImage {
    const WIDTH: u32 = 256;
    let dark = Color::rgb(tint.r * 0.25, tint.g * 0.25, tint.b * 0.25);
    let light = tint.lerp(Color::WHITE, 0.6);

    RgbaImage::from_fn(WIDTH, 1, |x, _| {
        let t = x as f32 / (WIDTH - 1) as f32;
        let c = if t < 0.5 {
            dark.lerp(tint, t * 2.0)
        } else {
            tint.lerp(light, t * 2.0 - 1.0)
        };
        Rgba([
            (c.r * 255.0).round() as u8,
            (c.g * 255.0).round() as u8,
            (c.b * 255.0).round() as u8,
            255,
        ])
    })
}

/// Stand-in for a missing HDR: a soft studio with a bright overhead panel
/// and two side strips above a dim floor.
pub fn studio_environment() -> Rgba32FImage {
    const WIDTH: u32 = 128;
    const HEIGHT: u32 = 64;

    Rgba32FImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let u = (x as f32 + 0.5) / WIDTH as f32;
        let v = (y as f32 + 0.5) / HEIGHT as f32;
        // v = 0 is straight up.
        let elevation = 1.0 - 2.0 * v;

        let mut radiance = if elevation > 0.0 {
            0.35 + 0.45 * elevation
        } else {
            0.08 + 0.1 * (1.0 + elevation)
        };
        if v < 0.12 {
            radiance += 6.0;
        }
        let strip = (u - 0.25).abs().min((u - 0.75).abs());
        if strip < 0.03 && (0.25..0.55).contains(&v) {
            radiance += 3.0;
        }

        Rgba([radiance, radiance * 0.98, radiance * 0.95, 1.0])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_halves_to_one_pixel() {
        let image = Rgba32FImage::from_pixel(16, 4, Rgba([4.0, 0.5, 0.25, 1.0]));
        let chain = build_mip_chain(&image);
        let sizes: Vec<_> = chain.iter().map(|level| level.dimensions()).collect();
        assert_eq!(sizes, vec![(16, 4), (8, 2), (4, 1), (2, 1), (1, 1)]);

        let last = chain[4].get_pixel(0, 0);
        assert!((last[0] - 4.0).abs() < 1e-4);
        assert!((last[2] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn gradient_runs_dark_to_light() {
        let ramp = procedural_gradient(Color::hex(0x9D73F7));
        assert_eq!(ramp.dimensions(), (256, 1));
        let first = ramp.get_pixel(0, 0);
        let last = ramp.get_pixel(255, 0);
        assert!(first[0] < last[0] && first[1] < last[1] && first[2] < last[2]);
        assert_eq!(first[3], 255);
    }

    #[test]
    fn studio_is_brighter_above() {
        let env = studio_environment();
        let (w, h) = env.dimensions();
        let top = env.get_pixel(w / 2, 0)[0];
        let floor = env.get_pixel(w / 2, h - 1)[0];
        assert!(top > floor);
        assert!(floor > 0.0);
    }
}
