//! Entities and the handles that refer to them

use slotmap::new_key_type;

use super::component::{CapabilityKind, CapabilityMask, Component};
use super::components::{
    AmbientLight, CameraComponent, DirectionalLight, MeshComponent, PointLight, Transform,
};

new_key_type! {
    /// Arena slot of an entity
    pub struct EntityKey;
}

/// Generational handle to an entity.
///
/// Holders (editor selection, pass caches, animation tracks) keep this
/// instead of a reference. It stops resolving once the scene generation it
/// was issued in has been cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub(crate) key: EntityKey,
    pub(crate) generation: u32,
}

impl EntityHandle {
    /// Scene generation this handle was issued in
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Per-kind record slots
#[derive(Debug, Clone, Default)]
pub(crate) struct CapabilitySlots {
    pub(crate) transform: Option<Transform>,
    pub(crate) mesh: Option<MeshComponent>,
    pub(crate) directional_light: Option<DirectionalLight>,
    pub(crate) point_light: Option<PointLight>,
    pub(crate) ambient_light: Option<AmbientLight>,
    pub(crate) camera: Option<CameraComponent>,
}

/// A named scene node owning at most one record per capability kind
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    index: u32,
    mask: CapabilityMask,
    pub(crate) slots: CapabilitySlots,
}

impl Entity {
    pub(crate) fn new(name: String, index: u32) -> Self {
        Self {
            name,
            index,
            mask: CapabilityMask::empty(),
            slots: CapabilitySlots::default(),
        }
    }

    /// Unique name within the scene generation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dense insertion index, also the entity's slot in the GPU object array
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Attached capability kinds
    pub fn capabilities(&self) -> CapabilityMask {
        self.mask
    }

    /// Whether a record of kind `T` is attached
    pub fn has<T: Component>(&self) -> bool {
        self.mask.contains(T::KIND.mask())
    }

    /// Whether a record of `kind` is attached
    pub fn has_kind(&self, kind: CapabilityKind) -> bool {
        self.mask.contains(kind.mask())
    }

    /// Record of kind `T`, if attached
    pub fn get<T: Component>(&self) -> Option<&T> {
        T::slot(self).as_ref()
    }

    /// Mutable record of kind `T`, if attached
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        T::slot_mut(self).as_mut()
    }

    /// Attach `record`.
    ///
    /// Attaching a kind that is already present logs a warning and returns
    /// the existing record untouched; `record` is dropped.
    pub fn add<T: Component>(&mut self, record: T) -> &mut T {
        if self.has::<T>() {
            log::warn!(
                "Entity '{}' already has a {} capability, keeping the existing one",
                self.name,
                T::KIND.name()
            );
        }
        self.mask.insert(T::KIND.mask());
        T::slot_mut(self).get_or_insert(record)
    }

    /// Existing record of kind `T`, or a default one attached now
    pub fn get_or_add<T: Component + Default>(&mut self) -> &mut T {
        self.get_or_insert_with(T::default)
    }

    /// Existing record of kind `T`, or the result of `make` attached now
    pub fn get_or_insert_with<T: Component>(&mut self, make: impl FnOnce() -> T) -> &mut T {
        self.mask.insert(T::KIND.mask());
        T::slot_mut(self).get_or_insert_with(make)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_add_twice_returns_same_instance() {
        let mut entity = Entity::new("Box".to_string(), 0);
        let first = entity.add(Transform::from_translation(Vec3::new(1.0, 2.0, 3.0))) as *const Transform;
        let second = entity.add(Transform::from_translation(Vec3::new(9.0, 9.0, 9.0))) as *const Transform;

        assert_eq!(first, second);
        let transform = entity.get::<Transform>().unwrap();
        assert_eq!(transform.translation, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_get_or_add_is_idempotent() {
        let mut entity = Entity::new("Light".to_string(), 0);
        entity.get_or_add::<PointLight>().intensity = 4.0;
        assert_eq!(entity.get_or_add::<PointLight>().intensity, 4.0);
        assert!(entity.has::<PointLight>());
        assert!(!entity.has::<Transform>());
        assert_eq!(entity.capabilities(), CapabilityMask::POINT_LIGHT);
    }
}
