//! The scene container
//!
//! A [`Scene`] owns the entity store, materials, both texture arrays, the
//! per-scene geometry pool and imported animation clips, plus the dirty
//! state ([`SceneStatus`] and the updated object index set) that the render
//! synchronizer consumes once per frame.
//!
//! Loading never mutates a live scene directly: loaders fill a staged scene
//! from [`Scene::staged`] and the caller swaps it in with
//! [`Scene::replace_with`] only when the whole load succeeded.

use std::collections::BTreeSet;
use std::mem;

use thiserror::Error;

use crate::core::SceneConfig;
use crate::ecs::components::{
    AmbientLight, CameraComponent, DirectionalLight, GeometrySource, MeshComponent, Transform,
};
use crate::ecs::{Entity, EntityHandle, EntityStore, StoreError};
use crate::foundation::math::Vec3;
use crate::render::primitives::camera::Camera;
use crate::render::primitives::mesh::{GeometryPool, MeshRange, Primitive, Vertex};

use super::animation::AnimationClip;
use super::bounds::{compute_local_aabb, merged_scene_aabb, Aabb};
use super::material::{Material, MaterialId};
use super::status::SceneStatus;
use super::texture::{Texture, TextureId, TextureKind};

/// Scene mutation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A configured hard limit was hit
    #[error("{what} capacity of {capacity} exceeded")]
    CapacityExceeded {
        /// What ran out
        what: &'static str,
        /// The configured limit
        capacity: usize,
    },

    /// The handle belongs to a cleared scene generation
    #[error("entity handle is stale")]
    StaleHandle,

    /// A mesh referenced a material that does not exist
    #[error("unknown material {0}")]
    UnknownMaterial(u32),
}

impl From<StoreError> for SceneError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CapacityExceeded { capacity } => Self::CapacityExceeded {
                what: "entity",
                capacity,
            },
        }
    }
}

/// Result alias for scene mutations
pub type SceneResult<T> = Result<T, SceneError>;

/// Entities, materials, textures and dirty state of one loaded scene
#[derive(Debug)]
pub struct Scene {
    entities: EntityStore,
    materials: Vec<Material>,
    textures_2d: Vec<Texture>,
    textures_cube: Vec<Texture>,
    geometry: GeometryPool,
    geometry_revision: u64,
    animations: Vec<AnimationClip>,
    active_camera: Option<EntityHandle>,
    status: SceneStatus,
    updated: BTreeSet<u32>,
    limits: SceneConfig,
}

impl Scene {
    /// Empty scene; its first frame is treated as freshly cleared
    pub fn new(limits: &SceneConfig) -> Self {
        Self {
            entities: EntityStore::with_capacity(limits.max_entities),
            materials: Vec::new(),
            textures_2d: Vec::new(),
            textures_cube: Vec::new(),
            geometry: GeometryPool::new(),
            geometry_revision: 0,
            animations: Vec::new(),
            active_camera: None,
            status: SceneStatus::CLEARED,
            updated: BTreeSet::new(),
            limits: limits.clone(),
        }
    }

    /// Empty scene to load into; handles from `self` never resolve in it
    pub fn staged(&self) -> Self {
        Self {
            entities: EntityStore::successor_of(&self.entities),
            geometry_revision: self.geometry_revision + 1,
            ..Self::new(&self.limits)
        }
    }

    /// Swap in a fully loaded staged scene
    pub fn replace_with(&mut self, staged: Scene) {
        *self = staged;
        self.status |= SceneStatus::CLEARED;
        log::info!(
            "Scene replaced: {} entities, {} materials, {} + {} textures",
            self.entities.len(),
            self.materials.len(),
            self.textures_2d.len(),
            self.textures_cube.len()
        );
    }

    /// Drop everything. Status becomes exactly [`SceneStatus::CLEARED`],
    /// object indices restart at 0 and older handles stop resolving.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.materials.clear();
        self.textures_2d.clear();
        self.textures_cube.clear();
        self.geometry.clear();
        self.geometry_revision += 1;
        self.animations.clear();
        self.active_camera = None;
        self.updated.clear();
        self.status = SceneStatus::CLEARED;
    }

    /// Configured limits
    pub fn limits(&self) -> &SceneConfig {
        &self.limits
    }

    /// Entity store
    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Mutable entity store. Callers that change render-visible data must
    /// follow up with [`Scene::mark_updated`].
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    /// Resolve a handle
    pub fn entity(&self, handle: EntityHandle) -> Option<&Entity> {
        self.entities.get(handle)
    }

    /// Resolve a handle mutably
    pub fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.entities.get_mut(handle)
    }

    /// Append an entity and mark its object slot for upload
    pub fn add_entity(&mut self, name: &str) -> SceneResult<EntityHandle> {
        let handle = self.entities.add_entity(name)?;
        if let Some(entity) = self.entities.get(handle) {
            self.updated.insert(entity.index());
        }
        self.status |= SceneStatus::OBJECT_ADDED;
        Ok(handle)
    }

    /// Add an entity drawing a template primitive
    pub fn add_object(
        &mut self,
        name: &str,
        transform: Transform,
        primitive: Primitive,
        material: MaterialId,
    ) -> SceneResult<EntityHandle> {
        self.check_material(material)?;
        let handle = self.add_entity(name)?;
        self.attach_template(handle, primitive, material)?;
        self.with_entity(handle, |entity| {
            entity.add(transform);
        })?;
        log::debug!("Added {:?} object '{}'", primitive, name);
        Ok(handle)
    }

    /// Attach a template primitive as the entity's mesh
    pub fn attach_template(
        &mut self,
        handle: EntityHandle,
        primitive: Primitive,
        material: MaterialId,
    ) -> SceneResult<()> {
        self.check_material(material)?;
        let range = primitive.range();
        let local_aabb = match primitive {
            Primitive::Cube => Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)),
            Primitive::Plane => Aabb::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 1.0)),
        };
        self.attach_mesh(handle, GeometrySource::Template, range, local_aabb, material)
    }

    /// Append geometry to the scene pool and attach it as the entity's mesh
    pub fn attach_geometry(
        &mut self,
        handle: EntityHandle,
        vertices: &[Vertex],
        indices: &[u32],
        material: MaterialId,
    ) -> SceneResult<MeshRange> {
        self.check_material(material)?;
        if !self.entities.contains(handle) {
            return Err(SceneError::StaleHandle);
        }
        let range = self.append_geometry(vertices, indices);
        self.attach_scene_range(handle, range, material)?;
        Ok(range)
    }

    /// Append geometry to the scene pool without attaching it
    pub fn append_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) -> MeshRange {
        self.geometry_revision += 1;
        self.geometry.append(vertices, indices)
    }

    /// Attach an existing scene pool range, e.g. a mesh shared by several nodes
    pub fn attach_scene_range(
        &mut self,
        handle: EntityHandle,
        range: MeshRange,
        material: MaterialId,
    ) -> SceneResult<()> {
        self.check_material(material)?;
        let local_aabb = compute_local_aabb(
            self.geometry.vertices(),
            self.geometry.indices(),
            range.first_index,
            range.index_count,
            range.vertex_offset,
        );
        self.attach_mesh(handle, GeometrySource::Scene, range, local_aabb, material)
    }

    fn attach_mesh(
        &mut self,
        handle: EntityHandle,
        source: GeometrySource,
        range: MeshRange,
        local_aabb: Aabb,
        material: MaterialId,
    ) -> SceneResult<()> {
        self.with_entity(handle, |entity| {
            entity.add(MeshComponent {
                source,
                first_index: range.first_index,
                index_count: range.index_count,
                vertex_offset: range.vertex_offset,
                local_aabb,
                material,
            });
        })
    }

    fn with_entity(&mut self, handle: EntityHandle, edit: impl FnOnce(&mut Entity)) -> SceneResult<()> {
        let entity = self.entities.get_mut(handle).ok_or(SceneError::StaleHandle)?;
        edit(entity);
        let index = entity.index();
        self.updated.insert(index);
        Ok(())
    }

    fn check_material(&self, material: MaterialId) -> SceneResult<()> {
        if material.index() < self.materials.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownMaterial(material.0))
        }
    }

    /// Request a re-upload of the entity's per-object data
    pub fn mark_updated(&mut self, handle: EntityHandle) -> SceneResult<()> {
        let index = self.entities.get(handle).ok_or(SceneError::StaleHandle)?.index();
        self.updated.insert(index);
        Ok(())
    }

    /// Request a re-upload of every entity
    pub fn mark_all_updated(&mut self) {
        self.updated.extend(self.entities.iter().map(|(_, entity)| entity.index()));
    }

    /// Append a material
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        // Per-object data embeds material parameters
        self.mark_all_updated();
        id
    }

    /// Material by id
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }

    /// Mutable material by id; marks every object for re-upload
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        if id.index() < self.materials.len() {
            self.mark_all_updated();
        }
        self.materials.get_mut(id.index())
    }

    /// All materials
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Append a 2-D texture
    pub fn add_texture_2d(&mut self, texture: Texture) -> SceneResult<TextureId> {
        let id = Self::push_texture(
            &mut self.textures_2d,
            texture,
            self.limits.max_textures_2d,
            "2-D texture",
        )?;
        self.status |= SceneStatus::TEXTURE_2D_ADDED;
        Ok(id)
    }

    /// Append a cube texture
    pub fn add_texture_cube(&mut self, texture: Texture) -> SceneResult<TextureId> {
        let id = Self::push_texture(
            &mut self.textures_cube,
            texture,
            self.limits.max_textures_cube,
            "cube texture",
        )?;
        self.status |= SceneStatus::TEXTURE_CUBE_ADDED;
        Ok(id)
    }

    fn push_texture(
        textures: &mut Vec<Texture>,
        texture: Texture,
        capacity: usize,
        what: &'static str,
    ) -> SceneResult<TextureId> {
        if textures.len() >= capacity {
            return Err(SceneError::CapacityExceeded { what, capacity });
        }
        let id = TextureId(textures.len() as u32);
        log::debug!("Added {} '{}' as {}", what, texture.name, id.0);
        textures.push(texture);
        Ok(id)
    }

    /// Texture array of a kind
    pub fn textures(&self, kind: TextureKind) -> &[Texture] {
        match kind {
            TextureKind::Texture2D => &self.textures_2d,
            TextureKind::Cube => &self.textures_cube,
        }
    }

    /// Per-scene geometry pool
    pub fn geometry(&self) -> &GeometryPool {
        &self.geometry
    }

    /// Bumped whenever the scene pool changes or the scene is replaced
    pub fn geometry_revision(&self) -> u64 {
        self.geometry_revision
    }

    /// Store an imported clip
    pub fn add_animation(&mut self, clip: AnimationClip) {
        self.animations.push(clip);
    }

    /// Imported clips
    pub fn animations(&self) -> &[AnimationClip] {
        &self.animations
    }

    /// Pending dirty flags
    pub fn status(&self) -> SceneStatus {
        self.status
    }

    /// Consume the dirty flags
    pub fn take_status(&mut self) -> SceneStatus {
        mem::take(&mut self.status)
    }

    /// Pending updated object indices
    pub fn updated(&self) -> &BTreeSet<u32> {
        &self.updated
    }

    /// Consume the updated object indices
    pub fn take_updated(&mut self) -> BTreeSet<u32> {
        mem::take(&mut self.updated)
    }

    /// The first entity with a directional light
    pub fn directional_light(&self) -> Option<(&Entity, &DirectionalLight)> {
        let entity = self.entities.get(self.entities.find_first_with::<DirectionalLight>()?)?;
        Some((entity, entity.get::<DirectionalLight>()?))
    }

    /// The first entity with an ambient light
    pub fn ambient_light(&self) -> Option<&AmbientLight> {
        self.entities
            .get(self.entities.find_first_with::<AmbientLight>()?)?
            .get::<AmbientLight>()
    }

    /// Union of all mesh world bounds
    pub fn scene_aabb(&self) -> Aabb {
        merged_scene_aabb(&self.entities)
    }

    /// Make an entity's camera the one rendered from
    pub fn set_active_camera(&mut self, handle: EntityHandle) -> SceneResult<()> {
        let entity = self.entities.get(handle).ok_or(SceneError::StaleHandle)?;
        if !entity.has::<CameraComponent>() {
            log::warn!("Entity '{}' has no camera; keeping the active camera", entity.name());
            return Ok(());
        }
        self.active_camera = Some(handle);
        Ok(())
    }

    /// Handle of the active camera entity, falling back to the first camera
    pub fn active_camera_entity(&self) -> Option<EntityHandle> {
        self.active_camera
            .filter(|handle| self.entities.contains(*handle))
            .or_else(|| self.entities.find_first_with::<CameraComponent>())
    }

    /// The camera rendered from
    pub fn camera(&self) -> Option<&Camera> {
        let handle = self.active_camera_entity()?;
        self.entities.get(handle)?.get::<CameraComponent>().map(|c| &c.camera)
    }

    /// The camera rendered from, mutably
    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        let handle = self.active_camera_entity()?;
        self.entities.get_mut(handle)?.get_mut::<CameraComponent>().map(|c| &mut c.camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::PointLight;
    use crate::scene::texture::ImageData;

    fn limits() -> SceneConfig {
        SceneConfig {
            max_entities: 16,
            max_objects: 16,
            max_textures_2d: 2,
            max_textures_cube: 1,
        }
    }

    fn texture(kind: TextureKind) -> Texture {
        Texture::from_image("t", kind, ImageData::solid([0; 4], kind.layer_count()))
    }

    #[test]
    fn test_new_scene_starts_cleared() {
        let scene = Scene::new(&limits());
        assert_eq!(scene.status(), SceneStatus::CLEARED);
    }

    #[test]
    fn test_add_object_marks_dirty_state() {
        let mut scene = Scene::new(&limits());
        scene.take_status();
        let material = scene.add_material(Material::default());
        let handle = scene
            .add_object("Cube", Transform::identity(), Primitive::Cube, material)
            .unwrap();

        assert_eq!(scene.take_status(), SceneStatus::OBJECT_ADDED);
        assert!(scene.take_updated().contains(&0));
        let mesh = scene.entity(handle).unwrap().get::<MeshComponent>().unwrap();
        assert_eq!(mesh.index_count, 36);
        assert_eq!(mesh.source, GeometrySource::Template);
    }

    #[test]
    fn test_unknown_material_is_rejected() {
        let mut scene = Scene::new(&limits());
        let result = scene.add_object("Cube", Transform::identity(), Primitive::Cube, MaterialId(3));
        assert_eq!(result, Err(SceneError::UnknownMaterial(3)));
        assert!(scene.entities().is_empty());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut scene = Scene::new(&limits());
        let material = scene.add_material(Material::default());
        let old = scene
            .add_object("Cube", Transform::identity(), Primitive::Cube, material)
            .unwrap();
        scene.add_texture_2d(texture(TextureKind::Texture2D)).unwrap();

        scene.clear();

        assert_eq!(scene.status(), SceneStatus::CLEARED);
        assert!(scene.entities().is_empty());
        assert!(scene.materials().is_empty());
        assert!(scene.textures(TextureKind::Texture2D).is_empty());
        assert!(scene.entity(old).is_none());
        assert_eq!(scene.mark_updated(old), Err(SceneError::StaleHandle));

        let material = scene.add_material(Material::default());
        let new = scene
            .add_object("Cube", Transform::identity(), Primitive::Cube, material)
            .unwrap();
        assert_eq!(scene.entity(new).unwrap().index(), 0);
    }

    #[test]
    fn test_texture_capacity_fails_fast() {
        let mut scene = Scene::new(&limits());
        scene.add_texture_cube(texture(TextureKind::Cube)).unwrap();
        let error = scene.add_texture_cube(texture(TextureKind::Cube)).unwrap_err();
        assert_eq!(
            error,
            SceneError::CapacityExceeded {
                what: "cube texture",
                capacity: 1
            }
        );
        assert!(scene.status().contains(SceneStatus::TEXTURE_CUBE_ADDED));
    }

    #[test]
    fn test_staged_scene_does_not_resolve_old_handles() {
        let mut scene = Scene::new(&limits());
        let old = scene.add_entity("Light").unwrap();

        let mut staged = scene.staged();
        staged.add_entity("Light").unwrap();
        assert!(staged.entity(old).is_none());

        let revision = scene.geometry_revision();
        scene.replace_with(staged);
        assert!(scene.entity(old).is_none());
        assert!(scene.status().contains(SceneStatus::CLEARED | SceneStatus::OBJECT_ADDED));
        assert_ne!(scene.geometry_revision(), revision);
    }

    #[test]
    fn test_attach_geometry_computes_bounds() {
        let mut scene = Scene::new(&limits());
        let material = scene.add_material(Material::default());
        let handle = scene.add_entity("Tri").unwrap();
        let vertex = |x: f32, y: f32| Vertex {
            position: [x, y, 0.0],
            ..Default::default()
        };
        let range = scene
            .attach_geometry(handle, &[vertex(0.0, 0.0), vertex(2.0, 0.0), vertex(0.0, 4.0)], &[0, 1, 2], material)
            .unwrap();
        assert_eq!(range.index_count, 3);
        let mesh = scene.entity(handle).unwrap().get::<MeshComponent>().unwrap();
        approx::assert_relative_eq!(mesh.local_aabb.max(), Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn test_singleton_light_lookup() {
        let mut scene = Scene::new(&limits());
        let handle = scene.add_entity("Lamp").unwrap();
        scene.entity_mut(handle).unwrap().add(PointLight::default());
        assert!(scene.directional_light().is_none());

        let sun = scene.add_entity("Sun").unwrap();
        scene.entity_mut(sun).unwrap().add(DirectionalLight::default());
        assert_eq!(scene.directional_light().unwrap().0.name(), "Sun");
    }
}
