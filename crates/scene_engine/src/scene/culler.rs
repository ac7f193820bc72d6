//! Visibility culling and draw ordering
//!
//! Every frame the culler walks the entity list once: mesh entities whose
//! world AABB survives the camera frustum test become draw items, optionally
//! sorted front to back by the distance of their box center to the eye.
//! There is no persistent spatial index.

use crate::core::RenderConfig;
use crate::ecs::components::{MeshComponent, Transform};
use crate::ecs::{EntityHandle, EntityStore};
use crate::render::primitives::camera::Camera;

use super::bounds::entity_world_aabb;

/// Culling switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullSettings {
    /// Drop meshes outside the camera frustum
    pub frustum_culling: bool,
    /// Sort visible meshes near to far
    pub distance_sort: bool,
}

impl Default for CullSettings {
    fn default() -> Self {
        Self {
            frustum_culling: true,
            distance_sort: true,
        }
    }
}

impl From<&RenderConfig> for CullSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            frustum_culling: config.frustum_culling,
            distance_sort: config.distance_sort,
        }
    }
}

/// One mesh to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    /// Entity owning the mesh
    pub handle: EntityHandle,
    /// Slot in the GPU object array, passed as push constant
    pub object_index: u32,
    /// Distance from the eye to the world AABB center
    pub distance: f32,
}

/// Ordered list of meshes for one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    items: Vec<DrawItem>,
}

impl DrawList {
    /// Items in draw order
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    /// Iterate in draw order
    pub fn iter(&self) -> std::slice::Iter<'_, DrawItem> {
        self.items.iter()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is drawn
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a DrawList {
    type Item = &'a DrawItem;
    type IntoIter = std::slice::Iter<'a, DrawItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Stable ascending sort by distance
pub fn sort_by_distance(items: &mut [DrawItem]) {
    items.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// Frustum culler
#[derive(Debug, Clone, Default)]
pub struct Culler {
    settings: CullSettings,
}

impl Culler {
    /// Culler with the given switches
    pub fn new(settings: CullSettings) -> Self {
        Self { settings }
    }

    /// Current switches
    pub fn settings(&self) -> CullSettings {
        self.settings
    }

    /// Replace the switches
    pub fn set_settings(&mut self, settings: CullSettings) {
        self.settings = settings;
    }

    /// Visible meshes for the camera's cached frustum.
    ///
    /// With frustum culling off every mesh is returned in insertion order
    /// and the sort switch is ignored.
    pub fn cull(&self, entities: &EntityStore, camera: &Camera) -> DrawList {
        let eye = camera.position();
        let frustum = camera.frustum();

        let mut items: Vec<DrawItem> = entities
            .iter()
            .filter_map(|(handle, entity)| {
                let mesh = entity.get::<MeshComponent>()?;
                let aabb = entity_world_aabb(mesh, entity.get::<Transform>());
                if self.settings.frustum_culling && !frustum.intersects_aabb(&aabb) {
                    return None;
                }
                Some(DrawItem {
                    handle,
                    object_index: entity.index(),
                    distance: (aabb.center - eye).norm(),
                })
            })
            .collect();

        if self.settings.frustum_culling && self.settings.distance_sort {
            sort_by_distance(&mut items);
        }

        log::trace!("Culled to {} of {} entities", items.len(), entities.len());
        DrawList { items }
    }

    /// Every mesh in insertion order; shadow casters ignore the camera
    pub fn shadow_casters(&self, entities: &EntityStore) -> DrawList {
        let items = entities
            .iter()
            .filter(|(_, entity)| entity.has::<MeshComponent>())
            .map(|(handle, entity)| DrawItem {
                handle,
                object_index: entity.index(),
                distance: 0.0,
            })
            .collect();
        DrawList { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::GeometrySource;
    use crate::foundation::math::{constants, Vec3};
    use crate::scene::bounds::Aabb;
    use crate::scene::material::MaterialId;

    fn add_mesh(store: &mut EntityStore, name: &str, position: Vec3) -> EntityHandle {
        let handle = store.add_entity(name).unwrap();
        let entity = store.get_mut(handle).unwrap();
        entity.add(Transform::from_translation(position));
        entity.add(MeshComponent {
            source: GeometrySource::Template,
            first_index: 0,
            index_count: 36,
            vertex_offset: 0,
            local_aabb: Aabb::new(Vec3::zeros(), Vec3::new(0.1, 0.1, 0.1)),
            material: MaterialId(0),
        });
        handle
    }

    fn camera() -> Camera {
        Camera::orbital(Vec3::zeros(), 5.0, 0.0, constants::HALF_PI)
    }

    #[test]
    fn test_sorts_near_to_far() {
        let mut store = EntityStore::with_capacity(8);
        add_mesh(&mut store, "d1", Vec3::new(0.0, 0.0, 4.0));
        add_mesh(&mut store, "d5", Vec3::new(0.0, 0.0, 0.0));
        add_mesh(&mut store, "d3", Vec3::new(0.0, 0.0, 2.0));

        let list = Culler::default().cull(&store, &camera());
        let distances: Vec<f32> = list.iter().map(|item| item.distance.round()).collect();
        assert_eq!(distances, vec![1.0, 3.0, 5.0]);
        let indices: Vec<u32> = list.iter().map(|item| item.object_index).collect();
        assert_eq!(indices, vec![0, 2, 1]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_distances() {
        let mut store = EntityStore::with_capacity(8);
        let first = add_mesh(&mut store, "a", Vec3::new(1.0, 0.0, 0.0));
        let second = add_mesh(&mut store, "b", Vec3::new(-1.0, 0.0, 0.0));

        let list = Culler::default().cull(&store, &camera());
        assert_eq!(list.items()[0].handle, first);
        assert_eq!(list.items()[1].handle, second);
    }

    #[test]
    fn test_outside_meshes_are_dropped() {
        let mut store = EntityStore::with_capacity(8);
        add_mesh(&mut store, "visible", Vec3::zeros());
        add_mesh(&mut store, "behind", Vec3::new(0.0, 0.0, 20.0));
        store.add_entity("no mesh").unwrap();

        let list = Culler::default().cull(&store, &camera());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_disabled_culling_returns_every_mesh_in_insertion_order() {
        let mut store = EntityStore::with_capacity(8);
        let far = add_mesh(&mut store, "far", Vec3::zeros());
        let behind = add_mesh(&mut store, "behind", Vec3::new(0.0, 0.0, 20.0));
        let near = add_mesh(&mut store, "near", Vec3::new(0.0, 0.0, 4.0));
        store.add_entity("light").unwrap();

        let culler = Culler::new(CullSettings {
            frustum_culling: false,
            distance_sort: true,
        });
        let handles: Vec<EntityHandle> = culler.cull(&store, &camera()).iter().map(|i| i.handle).collect();
        assert_eq!(handles, vec![far, behind, near]);
    }

    #[test]
    fn test_shadow_casters_ignore_frustum() {
        let mut store = EntityStore::with_capacity(8);
        add_mesh(&mut store, "visible", Vec3::zeros());
        add_mesh(&mut store, "behind", Vec3::new(0.0, 0.0, 20.0));
        assert_eq!(Culler::default().shadow_casters(&store).len(), 2);
    }
}
