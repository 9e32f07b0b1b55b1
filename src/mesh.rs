//! Mesh primitives and spatial transforms.
//!
//! - [`Vertex3d`] — The vertex format used by the blob pass: position, normal and UV
//! - [`RawGeometry`] — CPU-side geometry, built off the render thread
//! - [`Mesh`] — GPU-resident geometry with vertex and index buffers
//! - [`Transform`] — Position, rotation, and scale for placing things in 3D space
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use crate::gpu::GpuContext;
use glam::{Mat4, Vec2, Vec3};

/// A vertex with position, normal, and texture coordinates.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    /// The 3D position of this vertex in model space.
    pub position: [f32; 3],
    /// The surface normal vector.
    pub normal: [f32; 3],
    /// Texture coordinates, typically in the range [0, 1].
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// The wgpu vertex buffer layout descriptor for this vertex type.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed triangle geometry that has not been uploaded yet.
///
/// Plain data, so it can be generated on a worker thread and sent over.
#[derive(Clone, Debug, Default)]
pub struct RawGeometry {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn icosahedron_vertices() -> [Vec3; 12] {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
}

/// Equirectangular UV of a direction on the unit sphere. `v = 1` at the top.
fn sphere_uv(p: Vec3) -> Vec2 {
    let azimuth = p.z.atan2(-p.x);
    let inclination = (-p.y).atan2((p.x * p.x + p.z * p.z).sqrt());
    Vec2::new(azimuth / TAU + 0.5, 0.5 - inclination / PI)
}

/// Split triangle `abc` into `(detail + 1)^2` triangles on a flat grid.
fn subdivide(a: Vec3, b: Vec3, c: Vec3, detail: u32, out: &mut Vec<[Vec3; 3]>) {
    let cols = detail as usize + 1;
    let mut grid: Vec<Vec<Vec3>> = Vec::with_capacity(cols + 1);
    for i in 0..=cols {
        let f = i as f32 / cols as f32;
        let aj = a.lerp(c, f);
        let bj = b.lerp(c, f);
        let rows = cols - i;
        let row = (0..=rows)
            .map(|j| {
                if rows == 0 {
                    aj
                } else {
                    aj.lerp(bj, j as f32 / rows as f32)
                }
            })
            .collect();
        grid.push(row);
    }

    for i in 0..cols {
        for j in 0..(2 * (cols - i) - 1) {
            let k = j / 2;
            if j % 2 == 0 {
                out.push([grid[i][k + 1], grid[i + 1][k], grid[i][k]]);
            } else {
                out.push([grid[i][k + 1], grid[i + 1][k + 1], grid[i + 1][k]]);
            }
        }
    }
}

impl RawGeometry {
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// A subdivided icosahedron projected onto a sphere of `radius`.
    ///
    /// Each of the 20 faces is split into `(detail + 1)^2` triangles.
    /// Coincident corners are merged unless they sit on opposite sides of
    /// the UV seam, so the mesh is smooth everywhere but the seam column.
    pub fn icosphere(radius: f32, detail: u32) -> Self {
        let base = icosahedron_vertices();
        let mut triangles = Vec::with_capacity(20 * (detail as usize + 1).pow(2));
        for [a, b, c] in ICOSAHEDRON_FACES {
            subdivide(base[a], base[b], base[c], detail, &mut triangles);
        }

        let mut geometry = RawGeometry::default();
        let mut lookup: HashMap<[i32; 5], u32> = HashMap::new();

        for tri in triangles {
            let mut dirs = tri.map(|p| p.normalize());
            let centroid = (dirs[0] + dirs[1] + dirs[2]) / 3.0;
            if (dirs[1] - dirs[0]).cross(dirs[2] - dirs[0]).dot(centroid) < 0.0 {
                dirs.swap(1, 2);
            }

            let mut uvs = dirs.map(sphere_uv);
            // At the poles azimuth is undefined; borrow the triangle's.
            let centroid_u = sphere_uv(centroid.normalize()).x;
            for (dir, uv) in dirs.iter().zip(uvs.iter_mut()) {
                if dir.x.abs() < 1e-6 && dir.z.abs() < 1e-6 {
                    uv.x = centroid_u;
                }
            }
            // Triangles straddling the seam wrap their low side past 1.
            let min_u = uvs.iter().map(|uv| uv.x).fold(f32::MAX, f32::min);
            let max_u = uvs.iter().map(|uv| uv.x).fold(f32::MIN, f32::max);
            if max_u - min_u > 0.5 {
                for uv in &mut uvs {
                    if uv.x < 0.5 {
                        uv.x += 1.0;
                    }
                }
            }

            for (dir, uv) in dirs.into_iter().zip(uvs) {
                let position = dir * radius;
                let key = [
                    (position.x * 1e4).round() as i32,
                    (position.y * 1e4).round() as i32,
                    (position.z * 1e4).round() as i32,
                    (uv.x * 1e4).round() as i32,
                    (uv.y * 1e4).round() as i32,
                ];
                let index = *lookup.entry(key).or_insert_with(|| {
                    geometry.vertices.push(Vertex3d::new(
                        position.to_array(),
                        dir.to_array(),
                        uv.to_array(),
                    ));
                    (geometry.vertices.len() - 1) as u32
                });
                geometry.indices.push(index);
            }
        }

        geometry
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Upload to GPU buffers.
    pub fn upload(&self, gpu: &GpuContext) -> Mesh {
        Mesh::new(gpu, &self.vertices, &self.indices)
    }
}

/// GPU-resident 3D mesh geometry with vertex and index buffers.
#[derive(Debug)]
pub struct Mesh {
    /// The GPU buffer containing vertex data.
    pub(crate) vertex_buffer: wgpu::Buffer,
    /// The GPU buffer containing index data (u32 indices).
    pub(crate) index_buffer: wgpu::Buffer,
    /// The number of indices in the mesh (determines draw call size).
    pub(crate) index_count: u32,
}

impl Mesh {
    /// Creates a mesh from raw vertex and index data.
    pub fn new(gpu: &GpuContext, vertices: &[Vertex3d], indices: &[u32]) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

/// Position, rotation, and scale for placing objects in 3D space.
///
/// ```ignore
/// let transform = Transform::new()
///     .position(Vec3::new(0.0, 2.0, -5.0))
///     .rotation(Quat::from_rotation_y(0.5))
///     .uniform_scale(2.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: glam::Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: glam::Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: glam::Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Compute the 4x4 model matrix (scale, then rotation, then translation).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icosphere_triangle_count() {
        for detail in [0, 1, 3] {
            let geom = RawGeometry::icosphere(1.0, detail);
            assert_eq!(geom.triangle_count(), 20 * (detail as usize + 1).pow(2));
        }
    }

    #[test]
    fn icosphere_vertices_sit_on_radius() {
        let geom = RawGeometry::icosphere(1.8, 4);
        for v in &geom.vertices {
            let p = Vec3::from_array(v.position);
            assert!((p.length() - 1.8).abs() < 1e-4);
            assert!((Vec3::from_array(v.normal) - p / 1.8).length() < 1e-4);
        }
    }

    #[test]
    fn icosphere_merges_shared_corners() {
        let geom = RawGeometry::icosphere(1.0, 4);
        // Unmerged there would be one vertex per index.
        assert!(geom.vertices.len() * 4 < geom.indices.len());
        assert!(geom.indices.iter().all(|&i| (i as usize) < geom.vertices.len()));
    }

    #[test]
    fn icosphere_faces_point_outwards() {
        let geom = RawGeometry::icosphere(1.0, 2);
        for tri in geom.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(geom.vertices[i as usize].position));
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(a + b + c) > 0.0);
        }
    }

    #[test]
    fn seam_triangles_do_not_span_the_texture() {
        let geom = RawGeometry::icosphere(1.0, 3);
        for tri in geom.indices.chunks(3) {
            let us: Vec<f32> = tri
                .iter()
                .map(|&i| geom.vertices[i as usize].uv[0])
                .collect();
            let span = us.iter().cloned().fold(f32::MIN, f32::max)
                - us.iter().cloned().fold(f32::MAX, f32::min);
            assert!(span < 0.5, "uv span {span}");
        }
    }

    #[test]
    fn transform_matrix_translates() {
        let m = Transform::from_position(Vec3::new(1.0, 2.0, 3.0)).matrix();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }
}
