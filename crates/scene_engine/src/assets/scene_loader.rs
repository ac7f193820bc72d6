//! Build a [`Scene`] from a [`SceneFile`]
//!
//! Loading order: materials, glTF import, cube textures, objects, camera.
//! Everything lands in a staged scene; a failure anywhere discards it.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Quaternion;

use crate::ecs::components::{
    AmbientLight, CameraComponent, DirectionalLight, PointLight, ShadowSettings, Transform,
};
use crate::ecs::Component;
use crate::foundation::math::{constants, utils, Quat, Vec3, Vec4};
use crate::render::primitives::camera::{Camera, Projection};
use crate::scene::{Material, MaterialId, Scene, TextureId};

use super::scene_file::{CameraDesc, MaterialDesc, ObjectDesc, ObjectKind, SceneFile};
use super::{import_gltf, load_texture_cube, LoadError, LoadResult};

/// Parse a scene file into a new scene staged from `current`
pub fn load_scene_file(path: &Path, current: &Scene) -> LoadResult<Scene> {
    let json = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    log::info!("Loading scene {}", path.display());
    load_scene_str(&json, base_dir, current)
}

/// Parse a scene description; relative paths resolve against `base_dir`
pub fn load_scene_str(json: &str, base_dir: &Path, current: &Scene) -> LoadResult<Scene> {
    let file: SceneFile = serde_json::from_str(json)?;
    let mut staged = current.staged();
    SceneBuilder {
        scene: &mut staged,
        base_dir,
        cube_textures: Vec::new(),
        default_material: None,
    }
    .build(&file)?;
    Ok(staged)
}

impl Scene {
    /// Load a scene file and replace this scene with it. On error the
    /// current contents stay untouched.
    pub fn load_from_file(&mut self, path: &Path) -> LoadResult<()> {
        let staged = load_scene_file(path, self)?;
        self.replace_with(staged);
        Ok(())
    }

    /// Same as [`Scene::load_from_file`] for an in-memory description
    pub fn load_from_str(&mut self, json: &str, base_dir: &Path) -> LoadResult<()> {
        let staged = load_scene_str(json, base_dir, self)?;
        self.replace_with(staged);
        Ok(())
    }
}

struct SceneBuilder<'a> {
    scene: &'a mut Scene,
    base_dir: &'a Path,
    cube_textures: Vec<TextureId>,
    default_material: Option<MaterialId>,
}

impl SceneBuilder<'_> {
    fn build(mut self, file: &SceneFile) -> LoadResult<()> {
        for desc in &file.materials {
            let material = material_from_desc(desc);
            self.scene.add_material(material);
        }

        if let Some(gltf) = &file.gltf {
            import_gltf(self.scene, &self.resolve(gltf))?;
        }

        for path in &file.textures_cube {
            let texture = load_texture_cube(&self.resolve(path))?;
            let id = self.scene.add_texture_cube(texture)?;
            self.cube_textures.push(id);
        }

        for object in &file.objects {
            self.add_object(object)?;
        }

        self.add_camera(file.camera.as_ref())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn add_object(&mut self, desc: &ObjectDesc) -> LoadResult<()> {
        let transform = transform_from_desc(desc)?;
        match desc.kind {
            ObjectKind::Mesh => {
                let primitive = desc.mesh.ok_or_else(|| {
                    LoadError::InvalidScene(format!("mesh object '{}' has no mesh", desc.name))
                })?;
                let material = self.material_for(desc)?;
                self.scene.add_object(&desc.name, transform, primitive, material)?;
            }
            ObjectKind::DirectionalLight => {
                if self.scene.directional_light().is_some() {
                    log::warn!("Skipping '{}': scene already has a directional light", desc.name);
                    return Ok(());
                }
                let defaults = DirectionalLight::default();
                let light = DirectionalLight {
                    phi: desc.phi.map_or(defaults.phi, utils::deg_to_rad),
                    theta: desc.theta.map_or(defaults.theta, utils::deg_to_rad),
                    color: desc.color.map_or(defaults.color, Vec3::from),
                    intensity: desc.intensity.unwrap_or(defaults.intensity),
                    shadow: ShadowSettings {
                        enabled: desc.shadow.unwrap_or(defaults.shadow.enabled),
                        bias: desc.shadow_bias.unwrap_or(defaults.shadow.bias),
                        cull_mode: desc.shadow_cull.unwrap_or(defaults.shadow.cull_mode),
                    },
                };
                self.add_light(&desc.name, transform, light)?;
            }
            ObjectKind::PointLight => {
                let defaults = PointLight::default();
                let light = PointLight {
                    color: desc.color.map_or(defaults.color, Vec3::from),
                    intensity: desc.intensity.unwrap_or(defaults.intensity),
                    radius: desc.radius.unwrap_or(defaults.radius),
                };
                self.add_light(&desc.name, transform, light)?;
            }
            ObjectKind::AmbientLight => {
                if self.scene.ambient_light().is_some() {
                    log::warn!("Skipping '{}': scene already has an ambient light", desc.name);
                    return Ok(());
                }
                let defaults = AmbientLight::default();
                let light = AmbientLight {
                    color: desc.color.map_or(defaults.color, Vec3::from),
                    intensity: desc.intensity.unwrap_or(defaults.intensity),
                    irradiance: self.cube_texture(&desc.name, desc.irradiance_texture),
                    radiance: self.cube_texture(&desc.name, desc.radiance_texture),
                };
                self.add_light(&desc.name, transform, light)?;
            }
        }
        Ok(())
    }

    fn add_light<T: Component>(
        &mut self,
        name: &str,
        transform: Transform,
        light: T,
    ) -> LoadResult<()> {
        let handle = self.scene.add_entity(name)?;
        if let Some(entity) = self.scene.entity_mut(handle) {
            entity.add(transform);
            entity.add(light);
        }
        log::debug!("Added light '{}'", name);
        Ok(())
    }

    fn material_for(&mut self, desc: &ObjectDesc) -> LoadResult<MaterialId> {
        match desc.material {
            Some(index) if (index as usize) < self.scene.materials().len() => Ok(MaterialId(index)),
            Some(index) => Err(LoadError::InvalidReference(format!(
                "object '{}' uses material {} but the scene has {}",
                desc.name,
                index,
                self.scene.materials().len()
            ))),
            None => Ok(self.default_material()),
        }
    }

    fn default_material(&mut self) -> MaterialId {
        if let Some(id) = self.default_material {
            return id;
        }
        let id = self.scene.add_material(Material::named("Default"));
        self.default_material = Some(id);
        id
    }

    fn cube_texture(&self, object: &str, index: Option<u32>) -> Option<TextureId> {
        let index = index?;
        let id = self.cube_textures.get(index as usize).copied();
        if id.is_none() {
            log::warn!(
                "'{}' references cube texture {} but only {} were loaded",
                object,
                index,
                self.cube_textures.len()
            );
        }
        id
    }

    fn add_camera(&mut self, desc: Option<&CameraDesc>) -> LoadResult<()> {
        let camera = self.camera_from_desc(desc);
        let handle = self.scene.add_entity("Camera")?;
        if let Some(entity) = self.scene.entity_mut(handle) {
            entity.add(CameraComponent::new(camera));
        }
        self.scene.set_active_camera(handle)?;
        Ok(())
    }

    fn camera_from_desc(&self, desc: Option<&CameraDesc>) -> Camera {
        let bounds = self.scene.scene_aabb();
        let projection_with = |fov_y: Option<f32>| Projection {
            fov_y: fov_y.map_or(Projection::default().fov_y, utils::deg_to_rad),
            ..Projection::default()
        };
        let fitted_distance = |projection: &Projection| {
            let radius = bounds.extents.norm().max(1.0);
            radius / (projection.fov_y * 0.5).sin()
        };

        match desc {
            Some(CameraDesc::Orbital {
                target,
                distance,
                phi,
                theta,
                fov_y,
            }) => {
                let projection = projection_with(*fov_y);
                Camera::orbital(
                    target.map_or(bounds.center, Vec3::from),
                    distance.unwrap_or_else(|| fitted_distance(&projection)),
                    phi.map_or(0.0, utils::deg_to_rad),
                    theta.map_or(DEFAULT_THETA, utils::deg_to_rad),
                )
                .with_projection(projection)
            }
            Some(CameraDesc::FirstPerson {
                position,
                phi,
                theta,
                fov_y,
            }) => Camera::first_person(
                position.map_or_else(Vec3::zeros, Vec3::from),
                phi.map_or(0.0, utils::deg_to_rad),
                theta.map_or(0.0, utils::deg_to_rad),
            )
            .with_projection(projection_with(*fov_y)),
            None => {
                let projection = Projection::default();
                Camera::orbital(bounds.center, fitted_distance(&projection), 0.0, DEFAULT_THETA)
                    .with_projection(projection)
            }
        }
    }
}

const DEFAULT_THETA: f32 = constants::PI / 3.0;

fn material_from_desc(desc: &MaterialDesc) -> Material {
    match desc {
        MaterialDesc::Standard(standard) => {
            let defaults = Material::named(standard.name.clone());
            Material {
                base_color: Vec4::from(standard.base_color),
                emissive: standard.emissive.map_or(defaults.emissive, Vec3::from),
                metallic: standard.metallic.unwrap_or(defaults.metallic),
                roughness: standard.roughness.unwrap_or(defaults.roughness),
                ior: standard.ior.unwrap_or(defaults.ior),
                ..defaults
            }
        }
    }
}

fn transform_from_desc(desc: &ObjectDesc) -> LoadResult<Transform> {
    let rotation = match desc.rotation {
        Some([x, y, z, w]) => Quat::try_new(Quaternion::new(w, x, y, z), 1.0e-6).ok_or_else(|| {
            LoadError::InvalidScene(format!("object '{}' has a zero rotation quaternion", desc.name))
        })?,
        None => Quat::identity(),
    };
    Ok(Transform::from_trs(
        desc.translation.map_or_else(Vec3::zeros, Vec3::from),
        rotation,
        desc.scale.map_or_else(|| Vec3::new(1.0, 1.0, 1.0), Vec3::from),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SceneConfig;
    use crate::ecs::components::{MeshComponent, ShadowCullMode};
    use crate::render::primitives::camera::Navigation;
    use crate::scene::SceneStatus;
    use approx::assert_relative_eq;

    fn empty_scene() -> Scene {
        Scene::new(&SceneConfig::default())
    }

    const SCENE: &str = r#"{
        "materials": [
            { "type": "Standard", "name": "Red", "baseColor": [1, 0, 0, 1], "metallic": 0.5 }
        ],
        "objects": [
            { "name": "Floor", "type": "Mesh", "mesh": "Plane", "material": 0, "scale": [10, 1, 10] },
            { "name": "Box", "type": "Mesh", "mesh": "Cube", "translation": [0, 1, 0] },
            { "name": "Sun", "type": "DirectionalLight", "phi": 90, "theta": 45, "shadowCull": "Front" },
            { "name": "Moon", "type": "DirectionalLight" },
            { "name": "Lamp", "type": "PointLight", "translation": [2, 2, 2], "radius": 4 }
        ],
        "camera": { "type": "Orbital", "distance": 8, "phi": 0, "theta": 90, "fovY": 90 }
    }"#;

    #[test]
    fn test_loads_objects_lights_and_camera() {
        let scene = load_scene_str(SCENE, Path::new("."), &empty_scene()).unwrap();

        let floor = scene.entities().find_by_name("Floor").unwrap();
        let floor = scene.entity(floor).unwrap();
        assert_eq!(floor.get::<MeshComponent>().unwrap().material, MaterialId(0));
        assert_relative_eq!(floor.get::<Transform>().unwrap().scale, Vec3::new(10.0, 1.0, 10.0));

        // The box has no material and gets the appended default
        let boxed = scene.entities().find_by_name("Box").unwrap();
        assert_eq!(
            scene.entity(boxed).unwrap().get::<MeshComponent>().unwrap().material,
            MaterialId(1)
        );
        assert_relative_eq!(scene.materials()[0].metallic, 0.5);

        let (sun, light) = scene.directional_light().unwrap();
        assert_eq!(sun.name(), "Sun");
        assert_relative_eq!(light.phi, constants::HALF_PI, epsilon = 1e-6);
        assert_eq!(light.shadow.cull_mode, ShadowCullMode::Front);

        let camera = scene.camera().unwrap();
        assert_relative_eq!(camera.projection.fov_y, constants::HALF_PI, epsilon = 1e-6);
        assert!(matches!(camera.navigation, Navigation::Orbital { distance, .. } if (distance - 8.0).abs() < 1e-6));
    }

    #[test]
    fn test_duplicate_directional_light_is_skipped() {
        let scene = load_scene_str(SCENE, Path::new("."), &empty_scene()).unwrap();
        assert!(scene.entities().find_by_name("Moon").is_none());
        let lights = scene
            .entities()
            .iter()
            .filter(|(_, entity)| entity.has::<DirectionalLight>())
            .count();
        assert_eq!(lights, 1);
    }

    #[test]
    fn test_failed_load_keeps_previous_scene() {
        let mut scene = empty_scene();
        scene.load_from_str(SCENE, Path::new(".")).unwrap();
        scene.take_status();
        let count = scene.entities().len();
        let floor = scene.entities().find_by_name("Floor").unwrap();

        let broken = r#"{ "objects": [{ "name": "Box", "type": "Mesh", "mesh": "Cube", "material": 7 }] }"#;
        let error = scene.load_from_str(broken, Path::new(".")).unwrap_err();

        assert!(matches!(error, LoadError::InvalidReference(_)));
        assert_eq!(scene.entities().len(), count);
        assert!(scene.entity(floor).is_some());
        assert!(scene.status().is_empty());
    }

    #[test]
    fn test_unknown_object_type_fails() {
        let json = r#"{ "objects": [{ "name": "Spot", "type": "SpotLight" }] }"#;
        let error = load_scene_str(json, Path::new("."), &empty_scene()).unwrap_err();
        assert!(matches!(error, LoadError::Json(_)));
    }

    #[test]
    fn test_missing_cube_texture_reference_warns_and_clears() {
        let json = r#"{ "objects": [{ "name": "Sky", "type": "AmbientLight", "radianceTexture": 2 }] }"#;
        let scene = load_scene_str(json, Path::new("."), &empty_scene()).unwrap();
        let ambient = scene.ambient_light().unwrap();
        assert!(ambient.radiance.is_none());
    }

    #[test]
    fn test_default_camera_frames_the_scene() {
        let json = r#"{ "objects": [{ "name": "Box", "type": "Mesh", "mesh": "Cube", "translation": [4, 0, 0] }] }"#;
        let scene = load_scene_str(json, Path::new("."), &empty_scene()).unwrap();
        match scene.camera().unwrap().navigation {
            Navigation::Orbital { target, distance, .. } => {
                assert_relative_eq!(target, Vec3::new(4.0, 0.0, 0.0), epsilon = 1e-5);
                assert!(distance > 3.0_f32.sqrt());
            }
            Navigation::FirstPerson { .. } => panic!("expected an orbital camera"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let error = load_scene_file(Path::new("does/not/exist.json"), &empty_scene()).unwrap_err();
        assert!(matches!(error, LoadError::Io { .. }));
    }

    #[test]
    fn test_loaded_scene_reports_cleared() {
        let mut scene = empty_scene();
        scene.take_status();
        scene.load_from_str(SCENE, Path::new(".")).unwrap();
        assert!(scene.status().contains(SceneStatus::CLEARED));
    }
}
