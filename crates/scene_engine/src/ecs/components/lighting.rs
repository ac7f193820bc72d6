//! Light capabilities
//!
//! A scene has at most one [`DirectionalLight`] and one [`AmbientLight`];
//! point lights are unrestricted.

use crate::foundation::math::{utils, Vec3};
use crate::scene::texture::TextureId;

/// Which faces are culled when rendering the shadow map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ShadowCullMode {
    /// Cull front faces (fewer acne artifacts on closed meshes)
    Front,
    /// Cull back faces
    #[default]
    Back,
}

/// Shadow parameters of the directional light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Render the shadow pass at all
    pub enabled: bool,
    /// Constant depth bias in shadow map depth units
    pub bias: f32,
    /// Face culling used while rendering depth
    pub cull_mode: ShadowCullMode,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bias: 0.005,
            cull_mode: ShadowCullMode::Back,
        }
    }
}

/// Infinitely distant light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Azimuth around +Y in radians
    pub phi: f32,
    /// Polar angle from +Y in radians
    pub theta: f32,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Shadow parameters
    pub shadow: ShadowSettings,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            phi: 0.0,
            theta: 0.25 * std::f32::consts::PI,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            shadow: ShadowSettings::default(),
        }
    }
}

impl DirectionalLight {
    /// Unit vector pointing from the scene towards the light
    pub fn direction_to_light(&self) -> Vec3 {
        utils::spherical_direction(self.phi, self.theta)
    }
}

/// Positional light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Influence radius; uploaded but not used for attenuation
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            radius: 10.0,
        }
    }
}

/// Environment light backed by cube textures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Diffuse irradiance cube map
    pub irradiance: Option<TextureId>,
    /// Specular radiance cube map, also drawn as the skybox
    pub radiance: Option<TextureId>,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 0.2,
            irradiance: None,
            radiance: None,
        }
    }
}

impl AmbientLight {
    /// Cube texture the skybox samples: radiance if present, else irradiance
    pub fn skybox_texture(&self) -> Option<TextureId> {
        self.radiance.or(self.irradiance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_direction_from_spherical_angles() {
        let light = DirectionalLight {
            theta: 0.0,
            ..Default::default()
        };
        assert_relative_eq!(light.direction_to_light(), Vec3::y(), epsilon = 1e-6);
    }

    #[test]
    fn test_skybox_prefers_radiance() {
        let ambient = AmbientLight {
            irradiance: Some(TextureId(0)),
            radiance: Some(TextureId(1)),
            ..Default::default()
        };
        assert_eq!(ambient.skybox_texture(), Some(TextureId(1)));
    }
}
