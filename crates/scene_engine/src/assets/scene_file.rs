//! Serialized scene description
//!
//! ```json
//! {
//!   "gltf": "models/sponza.gltf",
//!   "texturesCube": ["sky/radiance.png"],
//!   "materials": [{ "type": "Standard", "name": "Red", "baseColor": [1, 0, 0, 1] }],
//!   "objects": [
//!     { "name": "Floor", "type": "Mesh", "mesh": "Plane", "material": 0, "scale": [10, 1, 10] },
//!     { "name": "Sun", "type": "DirectionalLight", "phi": 30, "theta": 45 }
//!   ],
//!   "camera": { "type": "Orbital", "distance": 8, "phi": 0, "theta": 70 }
//! }
//! ```
//!
//! Angles are in degrees, rotations are `[x, y, z, w]` quaternions. Paths
//! are relative to the scene file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ecs::components::ShadowCullMode;
use crate::render::primitives::mesh::Primitive;

/// Top level of a scene file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneFile {
    /// glTF file imported before the objects below are created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gltf: Option<PathBuf>,
    /// Cube map strips, referenced by index from ambient lights
    #[serde(default)]
    pub textures_cube: Vec<PathBuf>,
    /// Materials, referenced by index from mesh objects
    #[serde(default)]
    pub materials: Vec<MaterialDesc>,
    /// Entities to create
    #[serde(default)]
    pub objects: Vec<ObjectDesc>,
    /// Initial camera
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraDesc>,
}

/// Material entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MaterialDesc {
    /// Metallic-roughness material
    Standard(StandardMaterialDesc),
}

/// Parameters of a [`MaterialDesc::Standard`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMaterialDesc {
    /// Display name
    pub name: String,
    /// Linear RGBA
    pub base_color: [f32; 4],
    /// Linear RGB
    #[serde(default)]
    pub emissive: Option<[f32; 3]>,
    /// Metalness
    #[serde(default)]
    pub metallic: Option<f32>,
    /// Roughness
    #[serde(default)]
    pub roughness: Option<f32>,
    /// Index of refraction
    #[serde(default)]
    pub ior: Option<f32>,
}

/// Kind of an object entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Template primitive with a material
    Mesh,
    /// The scene's sun
    DirectionalLight,
    /// Positional light
    PointLight,
    /// Environment light
    AmbientLight,
}

/// Object entry; which optional fields matter depends on `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDesc {
    /// Entity name
    pub name: String,
    /// Object kind
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// Position
    #[serde(default)]
    pub translation: Option<[f32; 3]>,
    /// Orientation as `[x, y, z, w]`
    #[serde(default)]
    pub rotation: Option<[f32; 4]>,
    /// Per-axis scale
    #[serde(default)]
    pub scale: Option<[f32; 3]>,
    /// Primitive for mesh objects
    #[serde(default)]
    pub mesh: Option<Primitive>,
    /// Material index for mesh objects
    #[serde(default)]
    pub material: Option<u32>,
    /// Light color
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    /// Light intensity
    #[serde(default)]
    pub intensity: Option<f32>,
    /// Directional light azimuth in degrees
    #[serde(default)]
    pub phi: Option<f32>,
    /// Directional light polar angle in degrees
    #[serde(default)]
    pub theta: Option<f32>,
    /// Directional light casts shadows
    #[serde(default)]
    pub shadow: Option<bool>,
    /// Shadow depth bias
    #[serde(default)]
    pub shadow_bias: Option<f32>,
    /// Face culling of the shadow pass
    #[serde(default)]
    pub shadow_cull: Option<ShadowCullMode>,
    /// Point light radius
    #[serde(default)]
    pub radius: Option<f32>,
    /// Index into `texturesCube`
    #[serde(default)]
    pub irradiance_texture: Option<u32>,
    /// Index into `texturesCube`
    #[serde(default)]
    pub radiance_texture: Option<u32>,
}

/// Camera entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CameraDesc {
    /// Orbit around a target
    Orbital {
        /// Orbit center, defaults to the scene bounds center
        #[serde(default)]
        target: Option<[f32; 3]>,
        /// Orbit radius, defaults to fit the scene bounds
        #[serde(default)]
        distance: Option<f32>,
        /// Azimuth in degrees
        #[serde(default)]
        phi: Option<f32>,
        /// Polar angle in degrees
        #[serde(default)]
        theta: Option<f32>,
        /// Vertical field of view in degrees
        #[serde(default, rename = "fovY")]
        fov_y: Option<f32>,
    },
    /// Free flight
    FirstPerson {
        /// Eye position
        #[serde(default)]
        position: Option<[f32; 3]>,
        /// Yaw in degrees, 0 looks down -Z
        #[serde(default)]
        phi: Option<f32>,
        /// Pitch in degrees
        #[serde(default)]
        theta: Option<f32>,
        /// Vertical field of view in degrees
        #[serde(default, rename = "fovY")]
        fov_y: Option<f32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_documented_example() {
        let json = r#"{
            "texturesCube": ["sky.png"],
            "materials": [{ "type": "Standard", "name": "Red", "baseColor": [1, 0, 0, 1], "roughness": 0.2 }],
            "objects": [
                { "name": "Floor", "type": "Mesh", "mesh": "Plane", "material": 0, "scale": [10, 1, 10] },
                { "name": "Sun", "type": "DirectionalLight", "phi": 30, "theta": 45, "shadowCull": "Front" }
            ],
            "camera": { "type": "Orbital", "distance": 8, "fovY": 60 }
        }"#;
        let file: SceneFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.objects.len(), 2);
        assert_eq!(file.objects[0].mesh, Some(Primitive::Plane));
        assert_eq!(file.objects[1].shadow_cull, Some(ShadowCullMode::Front));
        let MaterialDesc::Standard(material) = &file.materials[0];
        assert_eq!(material.roughness, Some(0.2));
        assert!(matches!(file.camera, Some(CameraDesc::Orbital { fov_y: Some(_), .. })));
    }

    #[test]
    fn test_unknown_object_type_is_an_error() {
        let json = r#"{ "objects": [{ "name": "X", "type": "SpotLight" }] }"#;
        assert!(serde_json::from_str::<SceneFile>(json).is_err());
    }

    #[test]
    fn test_unknown_material_type_is_an_error() {
        let json = r#"{ "materials": [{ "type": "Glass", "name": "G", "baseColor": [1, 1, 1, 1] }] }"#;
        assert!(serde_json::from_str::<SceneFile>(json).is_err());
    }
}
