//! Per-scene uniform block
//!
//! Camera matrices, screen size, lights and the shadow matrix. Rebuilt
//! every frame; its layout follows std140.

use bytemuck::{Pod, Zeroable};

use crate::ecs::components::{PointLight, ShadowCullMode, Transform};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::primitives::camera::Camera;
use crate::scene::Scene;

use super::object_data::NO_TEXTURE;

/// Point lights uploaded per frame; extra lights are ignored
pub const MAX_POINT_LIGHTS: usize = 8;

/// One point light (std140)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightData {
    /// World position, radius in w
    pub position: [f32; 4],
    /// Color premultiplied by intensity
    pub color: [f32; 4],
}

/// Scene uniform buffer contents (std140)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniform {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip, Vulkan conventions
    pub projection: [[f32; 4]; 4],
    /// View to world
    pub inverse_view: [[f32; 4]; 4],
    /// Clip to view
    pub inverse_projection: [[f32; 4]; 4],
    /// World to shadow map clip space
    pub light_view_projection: [[f32; 4]; 4],
    /// Eye position in world space
    pub camera_position: [f32; 4],
    /// Width, height, 1/width, 1/height
    pub screen: [f32; 4],
    /// Direction towards the light, w = 1 when a directional light exists
    pub light_direction: [f32; 4],
    /// Color premultiplied by intensity, w = 1 when shadows are sampled
    pub light_color: [f32; 4],
    /// Depth bias, shadow map resolution, 1 when front faces are culled
    pub shadow_params: [f32; 4],
    /// Ambient color premultiplied by intensity, w = skybox cube index or -1
    pub ambient_color: [f32; 4],
    /// Irradiance and radiance cube indices, -1 when absent
    pub ambient_textures: [i32; 4],
    /// Number of valid point lights in x
    pub point_count: [u32; 4],
    /// Point lights
    pub point_lights: [PointLightData; MAX_POINT_LIGHTS],
}

impl SceneUniform {
    /// Byte size of the block
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Derive the block for the current frame
    pub fn build(
        scene: &Scene,
        camera: &Camera,
        extent: (u32, u32),
        light_view_projection: &Mat4,
        shadow_map_resolution: u32,
        shadows_rendered: bool,
    ) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let eye = camera.position();
        let width = extent.0.max(1) as f32;
        let height = extent.1.max(1) as f32;

        let mut uniform = Self::zeroed();
        uniform.view = view.into();
        uniform.projection = projection.into();
        uniform.inverse_view = view.try_inverse().unwrap_or_else(Mat4::identity).into();
        uniform.inverse_projection = projection.try_inverse().unwrap_or_else(Mat4::identity).into();
        uniform.light_view_projection = (*light_view_projection).into();
        uniform.camera_position = [eye.x, eye.y, eye.z, 1.0];
        uniform.screen = [width, height, 1.0 / width, 1.0 / height];

        if let Some((_, light)) = scene.directional_light() {
            let direction = light.direction_to_light();
            let color = light.color * light.intensity;
            uniform.light_direction = [direction.x, direction.y, direction.z, 1.0];
            uniform.light_color = [color.x, color.y, color.z, if shadows_rendered { 1.0 } else { 0.0 }];
            uniform.shadow_params = [
                light.shadow.bias,
                shadow_map_resolution as f32,
                if light.shadow.cull_mode == ShadowCullMode::Front { 1.0 } else { 0.0 },
                0.0,
            ];
        }

        uniform.ambient_textures = [NO_TEXTURE; 4];
        uniform.ambient_color = [0.0, 0.0, 0.0, NO_TEXTURE as f32];
        if let Some(ambient) = scene.ambient_light() {
            let color = ambient.color * ambient.intensity;
            let skybox = ambient.skybox_texture().map_or(NO_TEXTURE, |id| id.0 as i32);
            uniform.ambient_color = [color.x, color.y, color.z, skybox as f32];
            uniform.ambient_textures = [
                ambient.irradiance.map_or(NO_TEXTURE, |id| id.0 as i32),
                ambient.radiance.map_or(NO_TEXTURE, |id| id.0 as i32),
                NO_TEXTURE,
                NO_TEXTURE,
            ];
        }

        let mut count = 0;
        for (_, entity) in scene.entities().iter() {
            let Some(light) = entity.get::<PointLight>() else {
                continue;
            };
            if count == MAX_POINT_LIGHTS {
                log::trace!("More than {} point lights, ignoring the rest", MAX_POINT_LIGHTS);
                break;
            }
            let position = entity.get::<Transform>().map_or_else(Vec3::zeros, |t| t.translation);
            let color = light.color * light.intensity;
            uniform.point_lights[count] = PointLightData {
                position: [position.x, position.y, position.z, light.radius],
                color: [color.x, color.y, color.z, 1.0],
            };
            count += 1;
        }
        uniform.point_count = [count as u32, 0, 0, 0];

        uniform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SceneConfig;
    use crate::ecs::components::{AmbientLight, DirectionalLight};
    use crate::scene::TextureId;
    use approx::assert_relative_eq;

    #[test]
    fn test_scene_uniform_size() {
        assert_eq!(SceneUniform::SIZE, 704);
    }

    #[test]
    fn test_scene_uniform_lights() {
        let mut scene = Scene::new(&SceneConfig::default());
        let sun = scene.add_entity("Sun").unwrap();
        scene.entity_mut(sun).unwrap().add(DirectionalLight {
            theta: 0.0,
            intensity: 2.0,
            ..Default::default()
        });
        let sky = scene.add_entity("Sky").unwrap();
        scene.entity_mut(sky).unwrap().add(AmbientLight {
            irradiance: Some(TextureId(1)),
            ..Default::default()
        });
        for i in 0..3 {
            let lamp = scene.add_entity("Lamp").unwrap();
            let entity = scene.entity_mut(lamp).unwrap();
            entity.add(Transform::from_translation(Vec3::new(i as f32, 0.0, 0.0)));
            entity.add(PointLight::default());
        }

        let camera = Camera::orbital(Vec3::zeros(), 5.0, 0.0, 1.0);
        let uniform = SceneUniform::build(&scene, &camera, (800, 400), &Mat4::identity(), 1024, true);

        assert_relative_eq!(uniform.light_direction[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(uniform.light_color[0], 2.0);
        assert_relative_eq!(uniform.light_color[3], 1.0);
        assert_eq!(uniform.ambient_textures[0], 1);
        assert_relative_eq!(uniform.ambient_color[3], 1.0);
        assert_eq!(uniform.point_count[0], 3);
        assert_relative_eq!(uniform.point_lights[2].position[0], 2.0);
        assert_relative_eq!(uniform.screen[3], 1.0 / 400.0);
    }

    #[test]
    fn test_scene_uniform_without_lights() {
        let scene = Scene::new(&SceneConfig::default());
        let camera = Camera::orbital(Vec3::zeros(), 5.0, 0.0, 1.0);
        let uniform = SceneUniform::build(&scene, &camera, (0, 0), &Mat4::identity(), 1024, false);

        assert_relative_eq!(uniform.light_direction[3], 0.0);
        assert_relative_eq!(uniform.ambient_color[3], -1.0);
        assert_eq!(uniform.point_count[0], 0);
        // A zero extent never divides by zero
        assert_relative_eq!(uniform.screen[2], 1.0);
    }
}
