//! Mesh capability

use crate::scene::bounds::Aabb;
use crate::scene::material::MaterialId;

/// Which shared geometry pool a mesh indexes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometrySource {
    /// Per-scene pool filled by imports
    Scene,
    /// Built-in primitives shared across all scenes
    Template,
}

/// Index range into a geometry pool, its cached local bounds and material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshComponent {
    /// Pool the ranges refer to
    pub source: GeometrySource,
    /// First index in the pool's index buffer
    pub first_index: u32,
    /// Number of indices drawn
    pub index_count: u32,
    /// Added to every index before fetching a vertex
    pub vertex_offset: i32,
    /// Object-space bounds, computed once when the mesh is attached
    pub local_aabb: Aabb,
    /// Material used for shading
    pub material: MaterialId,
}
