//! Per-object GPU data
//!
//! One [`ObjectData`] per entity, stored at the entity's object index in a
//! std430 storage buffer. Shaders find their record through the object
//! index push constant.

use bytemuck::{Pod, Zeroable};

use crate::ecs::components::{MeshComponent, Transform};
use crate::ecs::Entity;
use crate::scene::{Material, TextureSlot};

/// Texture index written for an empty slot
pub const NO_TEXTURE: i32 = -1;

/// Per-object storage buffer record (std430)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectData {
    /// Model matrix `T * R * S`
    pub model: [[f32; 4]; 4],
    /// Normal matrix padded to 4x4
    pub normal: [[f32; 4]; 4],
    /// Linear RGBA base color
    pub base_color: [f32; 4],
    /// Emissive RGB, metallic in w
    pub emissive_metallic: [f32; 4],
    /// Roughness, ior, normal-mapping flag, unused
    pub params: [f32; 4],
    /// 2-D texture array indices per material slot, [`NO_TEXTURE`] if empty
    pub textures: [i32; 8],
}

impl ObjectData {
    /// Byte size of one record
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Derive the record of an entity; entities without a transform use
    /// identity, entities without a mesh use the default material
    pub fn from_entity(entity: &Entity, materials: &[Material]) -> Self {
        let transform = entity.get::<Transform>().copied().unwrap_or_default();
        let fallback = Material::default();
        let material = entity
            .get::<MeshComponent>()
            .and_then(|mesh| materials.get(mesh.material.index()))
            .unwrap_or(&fallback);
        Self::new(&transform, material)
    }

    /// Record for a transform and material
    pub fn new(transform: &Transform, material: &Material) -> Self {
        let mut textures = [NO_TEXTURE; 8];
        for slot in TextureSlot::ALL {
            if let Some(texture) = material.texture(slot) {
                textures[slot as usize] = texture.0 as i32;
            }
        }

        Self {
            model: transform.model_matrix().into(),
            normal: transform.normal_matrix_padded().into(),
            base_color: material.base_color.into(),
            emissive_metallic: [
                material.emissive.x,
                material.emissive.y,
                material.emissive.z,
                material.metallic,
            ],
            params: [
                material.roughness,
                material.ior,
                if material.normal_mapping { 1.0 } else { 0.0 },
                0.0,
            ],
            textures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::TextureId;
    use approx::assert_relative_eq;

    #[test]
    fn test_object_data_size_is_std430_aligned() {
        assert_eq!(ObjectData::SIZE, 208);
        assert_eq!(ObjectData::SIZE % 16, 0);
    }

    #[test]
    fn test_object_data_from_material() {
        let mut material = Material::named("Brick");
        material.metallic = 0.25;
        material.set_texture(TextureSlot::Normal, Some(TextureId(3)));

        let data = ObjectData::new(&Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)), &material);

        // Column-major: translation is the last column
        assert_relative_eq!(data.model[3][0], 1.0);
        assert_relative_eq!(data.model[3][2], 3.0);
        assert_relative_eq!(data.emissive_metallic[3], 0.25);
        assert_relative_eq!(data.params[2], 1.0);
        assert_eq!(data.textures[TextureSlot::Normal as usize], 3);
        assert_eq!(data.textures[TextureSlot::BaseColor as usize], NO_TEXTURE);
    }
}
