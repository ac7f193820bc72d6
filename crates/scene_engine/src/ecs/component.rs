//! Capability kinds and the typed slot access behind them
//!
//! The capability set is closed: every kind has a dedicated slot on
//! [`Entity`], so "does this entity have kind K" is a bit test and fetching
//! the record is a field access.

use bitflags::bitflags;

use super::components::{
    AmbientLight, CameraComponent, DirectionalLight, MeshComponent, PointLight, Transform,
};
use super::Entity;

/// Kind of a capability record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// Translation, rotation, scale
    Transform,
    /// Index range into a geometry pool plus material
    Mesh,
    /// The scene's single sun-like light
    DirectionalLight,
    /// Positional light
    PointLight,
    /// The scene's single environment light
    AmbientLight,
    /// Camera attached to the entity
    Camera,
}

impl CapabilityKind {
    /// Every kind, in slot order
    pub const ALL: [Self; 6] = [
        Self::Transform,
        Self::Mesh,
        Self::DirectionalLight,
        Self::PointLight,
        Self::AmbientLight,
        Self::Camera,
    ];

    /// Bit for this kind inside a [`CapabilityMask`]
    pub const fn mask(self) -> CapabilityMask {
        match self {
            Self::Transform => CapabilityMask::TRANSFORM,
            Self::Mesh => CapabilityMask::MESH,
            Self::DirectionalLight => CapabilityMask::DIRECTIONAL_LIGHT,
            Self::PointLight => CapabilityMask::POINT_LIGHT,
            Self::AmbientLight => CapabilityMask::AMBIENT_LIGHT,
            Self::Camera => CapabilityMask::CAMERA,
        }
    }

    /// Human readable name used in logs and editor listings
    pub const fn name(self) -> &'static str {
        match self {
            Self::Transform => "Transform",
            Self::Mesh => "Mesh",
            Self::DirectionalLight => "DirectionalLight",
            Self::PointLight => "PointLight",
            Self::AmbientLight => "AmbientLight",
            Self::Camera => "Camera",
        }
    }
}

bitflags! {
    /// Set of capability kinds attached to an entity
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CapabilityMask: u8 {
        /// Has a [`Transform`]
        const TRANSFORM = 1 << 0;
        /// Has a [`MeshComponent`]
        const MESH = 1 << 1;
        /// Has a [`DirectionalLight`]
        const DIRECTIONAL_LIGHT = 1 << 2;
        /// Has a [`PointLight`]
        const POINT_LIGHT = 1 << 3;
        /// Has an [`AmbientLight`]
        const AMBIENT_LIGHT = 1 << 4;
        /// Has a [`CameraComponent`]
        const CAMERA = 1 << 5;
    }
}

impl CapabilityMask {
    /// Kinds present in this mask, in slot order
    pub fn kinds(self) -> impl Iterator<Item = CapabilityKind> {
        CapabilityKind::ALL.into_iter().filter(move |kind| self.contains(kind.mask()))
    }
}

/// A capability record type that lives in a fixed slot of [`Entity`]
pub trait Component: Sized + 'static {
    /// Kind tag of this record
    const KIND: CapabilityKind;

    /// Shared access to the slot
    fn slot(entity: &Entity) -> &Option<Self>;

    /// Exclusive access to the slot
    fn slot_mut(entity: &mut Entity) -> &mut Option<Self>;
}

macro_rules! impl_component {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: CapabilityKind = CapabilityKind::$kind;

            fn slot(entity: &Entity) -> &Option<Self> {
                &entity.slots.$field
            }

            fn slot_mut(entity: &mut Entity) -> &mut Option<Self> {
                &mut entity.slots.$field
            }
        }
    };
}

impl_component!(Transform, Transform, transform);
impl_component!(MeshComponent, Mesh, mesh);
impl_component!(DirectionalLight, DirectionalLight, directional_light);
impl_component!(PointLight, PointLight, point_light);
impl_component!(AmbientLight, AmbientLight, ambient_light);
impl_component!(CameraComponent, Camera, camera);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_lists_kinds_in_slot_order() {
        let mask = CapabilityMask::CAMERA | CapabilityMask::TRANSFORM;
        let kinds: Vec<_> = mask.kinds().collect();
        assert_eq!(kinds, vec![CapabilityKind::Transform, CapabilityKind::Camera]);
    }

    #[test]
    fn test_kind_masks_are_distinct() {
        let combined = CapabilityKind::ALL
            .iter()
            .fold(CapabilityMask::empty(), |acc, kind| {
                assert!(!acc.contains(kind.mask()));
                acc | kind.mask()
            });
        assert_eq!(combined, CapabilityMask::all());
    }
}
