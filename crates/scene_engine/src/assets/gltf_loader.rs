//! glTF import into a scene
//!
//! Meshes are appended to the scene geometry pool once per primitive and
//! shared by every node instancing them. Each node becomes an entity with
//! its world transform; a node whose mesh has several primitives gets one
//! extra entity per additional primitive.

use std::collections::HashMap;
use std::path::Path;

use gltf::animation::util::ReadOutputs;
use gltf::image::Format;
use gltf::mesh::Mode;
use nalgebra::Quaternion;

use crate::ecs::components::Transform;
use crate::ecs::EntityHandle;
use crate::foundation::math::{Quat, Vec3, Vec4};
use crate::render::primitives::mesh::{MeshRange, Vertex};
use crate::scene::{
    AnimationChannel, AnimationClip, ImageData, Interpolation, Keyframes, Material, MaterialId,
    Scene, Texture, TextureId, TextureKind, TextureSlot,
};

use super::{LoadError, LoadResult};

/// Import every node of the default scene of a glTF file
pub fn import_gltf(scene: &mut Scene, path: &Path) -> LoadResult<()> {
    let (document, buffers, images) = gltf::import(path)?;
    if document.skins().next().is_some() {
        return Err(LoadError::Unsupported(format!("{}: skinned meshes", path.display())));
    }

    let mut import = GltfImport {
        scene,
        buffers: &buffers,
        textures: Vec::new(),
        material_offset: 0,
        fallback_material: None,
        primitives: HashMap::new(),
        nodes: HashMap::new(),
    };
    import.textures(&document, &images)?;
    import.materials(&document);
    import.meshes(&document)?;

    let Some(gltf_scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        log::warn!("{} contains no scene", path.display());
        return Ok(());
    };
    for node in gltf_scene.nodes() {
        import.node(&node, &Transform::identity())?;
    }
    import.animations(&document);

    log::info!(
        "Imported {}: {} meshes, {} materials, {} textures",
        path.display(),
        document.meshes().len(),
        document.materials().len(),
        import.textures.len()
    );
    Ok(())
}

struct GltfImport<'a> {
    scene: &'a mut Scene,
    buffers: &'a [gltf::buffer::Data],
    /// glTF texture index to scene texture
    textures: Vec<TextureId>,
    material_offset: u32,
    fallback_material: Option<MaterialId>,
    /// (mesh, primitive) to pool range and material
    primitives: HashMap<(usize, usize), (MeshRange, MaterialId)>,
    nodes: HashMap<usize, EntityHandle>,
}

impl GltfImport<'_> {
    /// Textures sharing a source image share one scene texture
    fn textures(&mut self, document: &gltf::Document, images: &[gltf::image::Data]) -> LoadResult<()> {
        let textures: Vec<gltf::Texture> = document.textures().collect();
        let scene = &mut *self.scene;
        let ids = import_once(
            textures.iter().map(|texture| texture.source().index()),
            |position, source| -> LoadResult<TextureId> {
                let texture = &textures[position];
                let data = images.get(source).ok_or_else(|| {
                    LoadError::InvalidReference(format!("texture {} uses missing image {}", texture.index(), source))
                })?;
                let image = rgba8_image(data)?;
                let name = texture
                    .name()
                    .or_else(|| texture.source().name())
                    .map_or_else(|| format!("gltf texture {}", texture.index()), str::to_owned);
                Ok(scene.add_texture_2d(Texture::from_image(name, TextureKind::Texture2D, image))?)
            },
        )?;
        self.textures = ids;
        Ok(())
    }

    fn materials(&mut self, document: &gltf::Document) {
        self.material_offset = self.scene.materials().len() as u32;
        for material in document.materials() {
            let pbr = material.pbr_metallic_roughness();
            let mut imported = Material {
                base_color: Vec4::from(pbr.base_color_factor()),
                emissive: Vec3::from(material.emissive_factor()),
                metallic: pbr.metallic_factor(),
                roughness: pbr.roughness_factor(),
                ..Material::named(material.name().unwrap_or("gltf material"))
            };
            let slots = [
                (TextureSlot::BaseColor, pbr.base_color_texture().map(|t| t.texture().index())),
                (
                    TextureSlot::MetallicRoughness,
                    pbr.metallic_roughness_texture().map(|t| t.texture().index()),
                ),
                (TextureSlot::Normal, material.normal_texture().map(|t| t.texture().index())),
                (TextureSlot::Occlusion, material.occlusion_texture().map(|t| t.texture().index())),
                (TextureSlot::Emissive, material.emissive_texture().map(|t| t.texture().index())),
            ];
            for (slot, index) in slots {
                imported.set_texture(slot, index.and_then(|index| self.texture(index)));
            }
            self.scene.add_material(imported);
        }
    }

    fn texture(&self, index: usize) -> Option<TextureId> {
        let id = self.textures.get(index).copied();
        if id.is_none() {
            log::warn!("glTF material references missing texture {}", index);
        }
        id
    }

    fn material(&mut self, index: Option<usize>) -> MaterialId {
        if let Some(index) = index {
            return MaterialId(self.material_offset + index as u32);
        }
        if let Some(id) = self.fallback_material {
            return id;
        }
        let id = self.scene.add_material(Material::named("gltf default"));
        self.fallback_material = Some(id);
        id
    }

    fn meshes(&mut self, document: &gltf::Document) -> LoadResult<()> {
        let buffers = self.buffers;
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    return Err(LoadError::Unsupported(format!(
                        "mesh {} primitive {} uses {:?}",
                        mesh.index(),
                        primitive.index(),
                        primitive.mode()
                    )));
                }
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .ok_or_else(|| {
                        LoadError::InvalidScene(format!("mesh {} has no positions", mesh.index()))
                    })?
                    .collect();
                let mut vertices: Vec<Vertex> = positions
                    .iter()
                    .map(|&position| Vertex {
                        position,
                        ..Vertex::default()
                    })
                    .collect();
                if let Some(normals) = reader.read_normals() {
                    for (vertex, normal) in vertices.iter_mut().zip(normals) {
                        vertex.normal = normal;
                    }
                }
                if let Some(uvs) = reader.read_tex_coords(0) {
                    for (vertex, uv) in vertices.iter_mut().zip(uvs.into_f32()) {
                        vertex.uv = uv;
                    }
                }
                if let Some(tangents) = reader.read_tangents() {
                    for (vertex, tangent) in vertices.iter_mut().zip(tangents) {
                        vertex.tangent = tangent;
                    }
                }
                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..vertices.len() as u32).collect(),
                };

                let range = self.scene.append_geometry(&vertices, &indices);
                let material = self.material(primitive.material().index());
                self.primitives
                    .insert((mesh.index(), primitive.index()), (range, material));
            }
        }
        Ok(())
    }

    fn node(&mut self, node: &gltf::Node, parent: &Transform) -> LoadResult<()> {
        let (translation, [x, y, z, w], scale) = node.transform().decomposed();
        let local = Transform::from_trs(
            Vec3::from(translation),
            Quat::from_quaternion(Quaternion::new(w, x, y, z)),
            Vec3::from(scale),
        );
        let world = parent.combine(&local);
        let name = node
            .name()
            .map_or_else(|| format!("Node {}", node.index()), str::to_owned);

        let handle = self.scene.add_entity(&name)?;
        if let Some(entity) = self.scene.entity_mut(handle) {
            entity.add(world);
        }
        self.nodes.insert(node.index(), handle);

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                let Some(&(range, material)) = self.primitives.get(&(mesh.index(), primitive.index())) else {
                    continue;
                };
                let target = if primitive.index() == 0 {
                    handle
                } else {
                    let extra = self.scene.add_entity(&name)?;
                    if let Some(entity) = self.scene.entity_mut(extra) {
                        entity.add(world);
                    }
                    extra
                };
                self.scene.attach_scene_range(target, range, material)?;
            }
        }

        for child in node.children() {
            self.node(&child, &world)?;
        }
        Ok(())
    }

    fn animations(&mut self, document: &gltf::Document) {
        let buffers = self.buffers;
        for animation in document.animations() {
            let mut channels = Vec::new();
            for channel in animation.channels() {
                let node = channel.target().node().index();
                let Some(&target) = self.nodes.get(&node) else {
                    log::warn!("Animation channel targets node {} outside the scene", node);
                    continue;
                };
                let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
                let Some(times) = reader.read_inputs() else {
                    continue;
                };
                let keyframes = match reader.read_outputs() {
                    Some(ReadOutputs::Translations(values)) => {
                        Keyframes::Translation(values.map(Vec3::from).collect())
                    }
                    Some(ReadOutputs::Rotations(values)) => Keyframes::Rotation(
                        values
                            .into_f32()
                            .map(|[x, y, z, w]| Quat::from_quaternion(Quaternion::new(w, x, y, z)))
                            .collect(),
                    ),
                    Some(ReadOutputs::Scales(values)) => Keyframes::Scale(values.map(Vec3::from).collect()),
                    Some(ReadOutputs::MorphTargetWeights(_)) => {
                        log::warn!("Skipping morph target animation on node {}", node);
                        continue;
                    }
                    None => continue,
                };
                let interpolation = match channel.sampler().interpolation() {
                    gltf::animation::Interpolation::Linear => Interpolation::Linear,
                    gltf::animation::Interpolation::Step => Interpolation::Step,
                    gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
                };
                channels.push(AnimationChannel {
                    target,
                    interpolation,
                    times: times.collect(),
                    keyframes,
                });
            }
            if !channels.is_empty() {
                let name = animation
                    .name()
                    .map_or_else(|| format!("Animation {}", animation.index()), str::to_owned);
                self.scene.add_animation(AnimationClip { name, channels });
            }
        }
    }
}

/// Convert decoded glTF image data to tightly packed RGBA8
fn rgba8_image(data: &gltf::image::Data) -> LoadResult<ImageData> {
    let texels = (data.width * data.height) as usize;
    let pixels: Vec<u8> = match data.format {
        Format::R8 => data.pixels.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        Format::R8G8 => data.pixels.chunks_exact(2).flat_map(|c| [c[0], c[1], 0, 255]).collect(),
        Format::R8G8B8 => data.pixels.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 255]).collect(),
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R16G16B16 => data
            .pixels
            .chunks_exact(6)
            .flat_map(|c| [c[1], c[3], c[5], 255])
            .collect(),
        Format::R16G16B16A16 => data
            .pixels
            .chunks_exact(8)
            .flat_map(|c| [c[1], c[3], c[5], c[7]])
            .collect(),
        other => {
            return Err(LoadError::Unsupported(format!("glTF image format {:?}", other)));
        }
    };
    if pixels.len() != texels * 4 {
        return Err(LoadError::InvalidScene(format!(
            "image of {}x{} holds {} bytes",
            data.width,
            data.height,
            data.pixels.len()
        )));
    }
    Ok(ImageData {
        width: data.width,
        height: data.height,
        layers: 1,
        pixels,
    })
}

/// Map each key to a value, calling `import` only for the first position
/// holding a given key
fn import_once<K, V, E>(
    keys: impl IntoIterator<Item = K>,
    mut import: impl FnMut(usize, K) -> Result<V, E>,
) -> Result<Vec<V>, E>
where
    K: Copy + Eq + std::hash::Hash,
    V: Copy,
{
    let mut imported = HashMap::new();
    let mut values = Vec::new();
    for (position, key) in keys.into_iter().enumerate() {
        let value = match imported.get(&key) {
            Some(&value) => value,
            None => {
                let value = import(position, key)?;
                imported.insert(key, value);
                value
            }
        };
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(format: Format, pixels: Vec<u8>) -> gltf::image::Data {
        gltf::image::Data {
            pixels,
            format,
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_rgb_expands_to_rgba() {
        let data = rgba8_image(&image(Format::R8G8B8, vec![10, 20, 30])).unwrap();
        assert_eq!(data.pixels, vec![10, 20, 30, 255]);
        assert!(data.is_consistent());
    }

    #[test]
    fn test_sixteen_bit_keeps_high_bytes() {
        let data = rgba8_image(&image(Format::R16G16B16A16, vec![0, 1, 0, 2, 0, 3, 0, 4])).unwrap();
        assert_eq!(data.pixels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_float_images_are_unsupported() {
        let error = rgba8_image(&image(Format::R32G32B32FLOAT, vec![0; 12])).unwrap_err();
        assert!(matches!(error, LoadError::Unsupported(_)));
    }

    #[test]
    fn test_shared_image_is_imported_once() {
        let mut calls = Vec::new();
        let ids = import_once([0usize, 1, 0, 2, 1], |position, source| {
            calls.push((position, source));
            Ok::<_, LoadError>(calls.len() as u32 - 1)
        })
        .unwrap();
        assert_eq!(calls, vec![(0, 0), (1, 1), (3, 2)]);
        assert_eq!(ids, vec![0, 1, 0, 2, 1]);
    }

    #[test]
    fn test_import_once_stops_on_first_error() {
        let result = import_once([0usize, 1, 2], |_, source| {
            if source == 1 {
                Err(LoadError::InvalidReference("image 1".into()))
            } else {
                Ok(source)
            }
        });
        assert!(matches!(result, Err(LoadError::InvalidReference(_))));
    }

    #[test]
    fn test_missing_file_is_gltf_error() {
        let mut scene = Scene::new(&crate::core::SceneConfig::default());
        let error = import_gltf(&mut scene, Path::new("missing.gltf")).unwrap_err();
        assert!(matches!(error, LoadError::Gltf(_)));
        assert!(scene.entities().is_empty());
    }
}
