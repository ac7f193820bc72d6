//! Surface materials

use crate::foundation::math::{Vec3, Vec4};

use super::texture::TextureId;

/// Index into the scene's material list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// List slot
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Texture slots of a material, in upload order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Albedo, multiplied with the base color
    BaseColor = 0,
    /// Metallic in B, roughness in G
    MetallicRoughness = 1,
    /// Tangent-space normal map
    Normal = 2,
    /// Ambient occlusion in R
    Occlusion = 3,
    /// Emissive color
    Emissive = 4,
}

impl TextureSlot {
    /// Number of slots
    pub const COUNT: usize = 5;

    /// Every slot in upload order
    pub const ALL: [Self; Self::COUNT] = [
        Self::BaseColor,
        Self::MetallicRoughness,
        Self::Normal,
        Self::Occlusion,
        Self::Emissive,
    ];
}

/// Metallic-roughness material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Display name
    pub name: String,
    /// Linear RGBA base color
    pub base_color: Vec4,
    /// Linear RGB emission
    pub emissive: Vec3,
    /// 0 = dielectric, 1 = metal
    pub metallic: f32,
    /// Perceptual roughness
    pub roughness: f32,
    /// Index of refraction
    pub ior: f32,
    /// Texture per [`TextureSlot`]
    pub textures: [Option<TextureId>; TextureSlot::COUNT],
    /// Sample the normal texture when shading
    pub normal_mapping: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::from("Default"),
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            emissive: Vec3::zeros(),
            metallic: 0.0,
            roughness: 0.5,
            ior: 1.5,
            textures: [None; TextureSlot::COUNT],
            normal_mapping: false,
        }
    }
}

impl Material {
    /// Named default material
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Texture bound to a slot
    pub fn texture(&self, slot: TextureSlot) -> Option<TextureId> {
        self.textures[slot as usize]
    }

    /// Bind a texture to a slot
    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<TextureId>) {
        self.textures[slot as usize] = texture;
        if slot == TextureSlot::Normal {
            self.normal_mapping = texture.is_some();
        }
    }
}
