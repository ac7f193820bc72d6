//! Vertex layout, template primitives and shared geometry pools
//!
//! Every mesh in a scene is an index range into one of two pools: the
//! per-scene pool that imports append to, and the template pool holding the
//! built-in primitives. Both use the same interleaved [`Vertex`] layout so a
//! single pipeline can draw from either.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;

/// Interleaved vertex as uploaded to the GPU (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
    /// Tangent in xyz, bitangent sign in w
    pub tangent: [f32; 4],
}

impl Vertex {
    /// Position as a vector
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

/// Index range of one mesh inside a [`GeometryPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRange {
    /// First index in the pool's index buffer
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Added to every index before the vertex fetch
    pub vertex_offset: i32,
}

/// Built-in primitives available to every scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Primitive {
    /// Cube spanning `[-1, 1]` on every axis
    Cube,
    /// Plane spanning `[-1, 1]` in XZ at `y = 0`, facing +Y
    Plane,
}

const CUBE_VERTEX_COUNT: u32 = 24;
const CUBE_INDEX_COUNT: u32 = 36;
const PLANE_INDEX_COUNT: u32 = 6;

impl Primitive {
    /// Range of this primitive inside the pool built by [`GeometryPool::templates`]
    pub const fn range(self) -> MeshRange {
        match self {
            Self::Cube => MeshRange {
                first_index: 0,
                index_count: CUBE_INDEX_COUNT,
                vertex_offset: 0,
            },
            Self::Plane => MeshRange {
                first_index: CUBE_INDEX_COUNT,
                index_count: PLANE_INDEX_COUNT,
                vertex_offset: CUBE_VERTEX_COUNT as i32,
            },
        }
    }
}

/// CPU copy of a vertex and index buffer pair
#[derive(Debug, Clone, Default)]
pub struct GeometryPool {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl GeometryPool {
    /// Empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool holding every [`Primitive`] at the ranges reported by [`Primitive::range`]
    pub fn templates() -> Self {
        let mut pool = Self::new();
        let (vertices, indices) = cube_geometry();
        pool.append(&vertices, &indices);
        let (vertices, indices) = plane_geometry();
        pool.append(&vertices, &indices);
        pool
    }

    /// Append a mesh; indices stay local to `vertices` and are rebased
    /// through the returned vertex offset at draw time.
    pub fn append(&mut self, vertices: &[Vertex], indices: &[u32]) -> MeshRange {
        let range = MeshRange {
            first_index: self.indices.len() as u32,
            index_count: indices.len() as u32,
            vertex_offset: self.vertices.len() as i32,
        };
        self.vertices.extend_from_slice(vertices);
        self.indices.extend_from_slice(indices);
        range
    }

    /// All vertices
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// True when nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Drop all geometry
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}

fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, tangent) per face; bitangent = normal x tangent keeps CCW winding outward
    let faces = [
        (Vec3::x(), -Vec3::z()),
        (-Vec3::x(), Vec3::z()),
        (Vec3::y(), Vec3::x()),
        (-Vec3::y(), Vec3::x()),
        (Vec3::z(), Vec3::x()),
        (-Vec3::z(), -Vec3::x()),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(CUBE_VERTEX_COUNT as usize);
    let mut indices = Vec::with_capacity(CUBE_INDEX_COUNT as usize);
    for (normal, tangent) in faces {
        let bitangent = normal.cross(&tangent);
        let base = vertices.len() as u32;
        for (s, t) in corners {
            let position: Vec3 = normal + tangent * s + bitangent * t;
            vertices.push(Vertex {
                position: position.into(),
                normal: normal.into(),
                uv: [(s + 1.0) * 0.5, 1.0 - (t + 1.0) * 0.5],
                tangent: [tangent.x, tangent.y, tangent.z, 1.0],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn plane_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let vertex = |x: f32, z: f32| Vertex {
        position: [x, 0.0, z],
        normal: [0.0, 1.0, 0.0],
        uv: [(x + 1.0) * 0.5, (z + 1.0) * 0.5],
        tangent: [1.0, 0.0, 0.0, 1.0],
    };
    let vertices = vec![vertex(-1.0, -1.0), vertex(-1.0, 1.0), vertex(1.0, 1.0), vertex(1.0, -1.0)];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vertex_is_48_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
    }

    #[test]
    fn test_template_ranges_match_pool_contents() {
        let pool = GeometryPool::templates();
        assert_eq!(pool.vertices().len(), 28);
        assert_eq!(pool.indices().len(), 42);

        let plane = Primitive::Plane.range();
        let first = pool.indices()[plane.first_index as usize] as i32 + plane.vertex_offset;
        assert_relative_eq!(pool.vertices()[first as usize].normal[1], 1.0);
    }

    #[test]
    fn test_cube_triangles_wind_outward() {
        let pool = GeometryPool::templates();
        let range = Primitive::Cube.range();
        let indices = &pool.indices()[..range.index_count as usize];
        for triangle in indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| pool.vertices()[triangle[i] as usize].position());
            let face_normal = (b - a).cross(&(c - a));
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn test_append_reports_offsets() {
        let mut pool = GeometryPool::templates();
        let range = pool.append(&[Vertex::default(); 3], &[0, 1, 2]);
        assert_eq!(range.first_index, 42);
        assert_eq!(range.vertex_offset, 28);
        assert_eq!(range.index_count, 3);
    }
}
