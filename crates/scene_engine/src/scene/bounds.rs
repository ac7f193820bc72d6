//! Axis-aligned bounding boxes
//!
//! Boxes are stored as center plus half-extents. Local boxes are computed
//! once when a mesh is attached; world boxes are derived from them every
//! time they are needed.

use crate::ecs::components::{MeshComponent, Transform};
use crate::ecs::EntityStore;
use crate::foundation::math::Vec3;
use crate::render::primitives::mesh::Vertex;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    /// Box center
    pub center: Vec3,
    /// Half size along each axis, never negative
    pub extents: Vec3,
}

impl Aabb {
    /// Box from center and half-extents
    pub const fn new(center: Vec3, extents: Vec3) -> Self {
        Self { center, extents }
    }

    /// Zero-size box at the origin
    pub fn degenerate() -> Self {
        Self::default()
    }

    /// Box spanning two corners
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            extents: (max - min).abs() * 0.5,
        }
    }

    /// Smallest box holding every point; `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Some(Self::from_min_max(min, max))
    }

    /// Minimum corner
    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    /// Maximum corner
    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// The eight corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min(), self.max());
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Smallest box containing both
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Self::from_min_max(self.min().inf(&other.min()), self.max().sup(&other.max()))
    }
}

/// Bounds of the vertices referenced by an index range.
///
/// Indices outside the vertex slice are skipped. An empty range yields a
/// degenerate box.
pub fn compute_local_aabb(
    vertices: &[Vertex],
    indices: &[u32],
    first_index: u32,
    index_count: u32,
    vertex_offset: i32,
) -> Aabb {
    let start = first_index as usize;
    let end = start.saturating_add(index_count as usize).min(indices.len());
    let referenced = indices.get(start..end).unwrap_or_default();

    Aabb::from_points(referenced.iter().filter_map(|&index| {
        let vertex = i64::from(index) + i64::from(vertex_offset);
        usize::try_from(vertex)
            .ok()
            .and_then(|v| vertices.get(v))
            .map(Vertex::position)
    }))
    .unwrap_or_default()
}

/// World-space bounds of a local box under a transform.
///
/// Scale is applied to center and extents, the eight corners are rotated and
/// re-boxed, then the translation is added.
pub fn world_aabb(local: &Aabb, transform: &Transform) -> Aabb {
    let scaled = Aabb::new(
        local.center.component_mul(&transform.scale),
        local.extents.component_mul(&transform.scale).abs(),
    );
    let rotated = Aabb::from_points(scaled.corners().map(|corner| transform.rotation * corner))
        .unwrap_or(scaled);
    Aabb::new(rotated.center + transform.translation, rotated.extents)
}

/// World bounds of one mesh entity; a missing transform counts as identity
pub fn entity_world_aabb(mesh: &MeshComponent, transform: Option<&Transform>) -> Aabb {
    match transform {
        Some(transform) => world_aabb(&mesh.local_aabb, transform),
        None => mesh.local_aabb,
    }
}

/// Union of the world bounds of every mesh entity, degenerate when there
/// are none
pub fn merged_scene_aabb(entities: &EntityStore) -> Aabb {
    entities
        .iter()
        .filter_map(|(_, entity)| {
            entity
                .get::<MeshComponent>()
                .map(|mesh| entity_world_aabb(mesh, entity.get::<Transform>()))
        })
        .reduce(|merged, aabb| merged.merge(&aabb))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{constants::HALF_PI, Quat};
    use crate::render::primitives::mesh::{GeometryPool, Primitive};
    use approx::assert_relative_eq;

    fn unit_cube_aabb() -> Aabb {
        let pool = GeometryPool::templates();
        let range = Primitive::Cube.range();
        compute_local_aabb(
            pool.vertices(),
            pool.indices(),
            range.first_index,
            range.index_count,
            range.vertex_offset,
        )
    }

    #[test]
    fn test_local_aabb_of_unit_cube() {
        let aabb = unit_cube_aabb();
        assert_relative_eq!(aabb.center, Vec3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(aabb.extents, Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_local_aabb_respects_range_and_offset() {
        let pool = GeometryPool::templates();
        let range = Primitive::Plane.range();
        let aabb = compute_local_aabb(
            pool.vertices(),
            pool.indices(),
            range.first_index,
            range.index_count,
            range.vertex_offset,
        );
        assert_relative_eq!(aabb.extents, Vec3::new(1.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_empty_range_is_degenerate() {
        let aabb = compute_local_aabb(&[], &[], 0, 0, 0);
        assert_eq!(aabb, Aabb::degenerate());
    }

    #[test]
    fn test_world_aabb_identity_equals_local() {
        let local = Aabb::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.5, 1.0, 2.0));
        let world = world_aabb(&local, &Transform::identity());
        assert_relative_eq!(world.center, local.center, epsilon = 1e-6);
        assert_relative_eq!(world.extents, local.extents, epsilon = 1e-6);
    }

    #[test]
    fn test_world_aabb_scale_rotate_translate() {
        let local = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let transform = Transform::from_trs(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::y_axis(), HALF_PI),
            Vec3::new(3.0, 1.0, 1.0),
        );
        let world = world_aabb(&local, &transform);
        // X extent of 3 rotates onto Z
        assert_relative_eq!(world.extents, Vec3::new(1.0, 1.0, 3.0), epsilon = 1e-5);
        assert_relative_eq!(world.center, Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_merged_scene_aabb() {
        let mut store = EntityStore::with_capacity(8);
        assert_eq!(merged_scene_aabb(&store), Aabb::degenerate());

        let local = unit_cube_aabb();
        for x in [-4.0, 6.0] {
            let handle = store.add_entity("cube").unwrap();
            let entity = store.get_mut(handle).unwrap();
            entity.add(Transform::from_translation(Vec3::new(x, 0.0, 0.0)));
            entity.add(MeshComponent {
                source: crate::ecs::components::GeometrySource::Template,
                first_index: 0,
                index_count: 36,
                vertex_offset: 0,
                local_aabb: local,
                material: crate::scene::material::MaterialId(0),
            });
        }
        store.add_entity("light").unwrap();

        let merged = merged_scene_aabb(&store);
        assert_relative_eq!(merged.min(), Vec3::new(-5.0, -1.0, -1.0), epsilon = 1e-6);
        assert_relative_eq!(merged.max(), Vec3::new(7.0, 1.0, 1.0), epsilon = 1e-6);
    }
}
