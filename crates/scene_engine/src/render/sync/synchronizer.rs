//! Scene to GPU synchronization
//!
//! [`SceneSynchronizer`] owns the per-object storage buffer, the scene
//! uniform buffer, every uploaded texture and the set 0 descriptor sets
//! (one per frame slot). Once per frame it consumes the scene's dirty state
//! through a [`SyncPlan`] and records the resulting buffer writes into the
//! frame command buffer.
//!
//! Set 0 layout:
//!
//! | binding | contents                         |
//! |---------|----------------------------------|
//! | 0       | scene uniform                    |
//! | 1       | object storage buffer            |
//! | 2       | 2-D textures, `max_textures_2d`  |
//! | 3       | cube textures, `max_textures_cube` |

use std::ops::Range;

use ash::vk;
use bytemuck::Zeroable;

use crate::core::SceneConfig;
use crate::render::backends::vulkan::{
    Buffer, CommandPool, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter,
    GpuDevice, Image, Sampler,
};
use crate::render::error::RenderResult;
use crate::scene::{ImageData, Scene, TextureKind};

use super::object_data::ObjectData;
use super::plan::{SyncInput, SyncPlan};
use super::scene_uniform::SceneUniform;

const OBJECT_SIZE: vk::DeviceSize = ObjectData::SIZE as vk::DeviceSize;
const UNIFORM_SIZE: vk::DeviceSize = SceneUniform::SIZE as vk::DeviceSize;

/// GPU mirror of one scene
pub struct SceneSynchronizer {
    gpu: GpuDevice,
    limits: SceneConfig,
    object_buffer: Buffer,
    scene_buffer: Buffer,
    staging: Vec<Buffer>,
    layout: DescriptorSetLayout,
    sets: Vec<vk::DescriptorSet>,
    stale: Vec<bool>,
    textures_2d: Vec<Image>,
    textures_cube: Vec<Image>,
    placeholder_2d: Image,
    placeholder_cube: Image,
    sampler_2d: Sampler,
    sampler_cube: Sampler,
    first_frame: bool,
    // Destroyed after the sets allocated from it
    _pool: DescriptorPool,
}

impl SceneSynchronizer {
    /// Allocate buffers, placeholders and one descriptor set per frame slot
    pub fn new(gpu: &GpuDevice, command_pool: &CommandPool, limits: &SceneConfig, slots: usize) -> RenderResult<Self> {
        let object_bytes = limits.max_objects.max(1) as vk::DeviceSize * OBJECT_SIZE;
        let object_buffer = Buffer::device_local(gpu, object_bytes, vk::BufferUsageFlags::STORAGE_BUFFER)?;
        let scene_buffer = Buffer::device_local(gpu, UNIFORM_SIZE, vk::BufferUsageFlags::UNIFORM_BUFFER)?;

        let staging = (0..slots)
            .map(|_| Buffer::staging(gpu, object_bytes + UNIFORM_SIZE))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, stages)
            .add_storage_buffer(1, stages)
            .add_combined_image_sampler_array(2, limits.max_textures_2d as u32, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler_array(3, limits.max_textures_cube as u32, vk::ShaderStageFlags::FRAGMENT)
            .build(&gpu.device)?;
        let pool = DescriptorPool::for_layout(&gpu.device, &layout, slots as u32)?;
        let sets = pool.allocate_descriptor_sets(&vec![layout.handle(); slots])?;

        let placeholder_2d = Image::from_image_data(
            gpu,
            command_pool,
            TextureKind::Texture2D,
            &ImageData::solid([255, 255, 255, 255], 1),
        )?;
        let placeholder_cube = Image::from_image_data(
            gpu,
            command_pool,
            TextureKind::Cube,
            &ImageData::solid([0, 0, 0, 255], TextureKind::Cube.layer_count()),
        )?;

        log::debug!(
            "Scene synchronizer: {} object slots, {} + {} texture slots, {} frame slots",
            limits.max_objects,
            limits.max_textures_2d,
            limits.max_textures_cube,
            slots
        );

        Ok(Self {
            gpu: gpu.clone(),
            limits: limits.clone(),
            object_buffer,
            scene_buffer,
            staging,
            layout,
            sets,
            stale: vec![true; slots],
            textures_2d: Vec::new(),
            textures_cube: Vec::new(),
            placeholder_2d,
            placeholder_cube,
            sampler_2d: Sampler::linear(gpu, vk::SamplerAddressMode::REPEAT)?,
            sampler_cube: Sampler::linear(gpu, vk::SamplerAddressMode::CLAMP_TO_EDGE)?,
            first_frame: true,
            _pool: pool,
        })
    }

    /// Layout of set 0
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout.handle()
    }

    /// Set 0 of a frame slot
    pub fn descriptor_set(&self, slot: usize) -> vk::DescriptorSet {
        self.sets[slot]
    }

    /// Consume the scene's dirty state and record this frame's updates.
    ///
    /// Must run after the slot's fence was waited and before any pass
    /// records.
    pub fn sync(
        &mut self,
        command_buffer: vk::CommandBuffer,
        slot: usize,
        command_pool: &CommandPool,
        scene: &mut Scene,
        uniform: &SceneUniform,
    ) -> RenderResult<()> {
        let plan = take_plan(
            scene,
            self.first_frame,
            (self.textures_2d.len(), self.textures_cube.len()),
            &self.limits,
        )?;
        self.first_frame = false;

        if !plan.is_idle() {
            log::trace!("Sync plan: {:?}", plan);
        }

        if plan.destroy_textures && !(self.textures_2d.is_empty() && self.textures_cube.is_empty()) {
            // Other frame slots may still sample the old images
            self.gpu.wait_idle()?;
            self.textures_2d.clear();
            self.textures_cube.clear();
        }

        self.upload_textures(command_pool, scene, &plan)?;

        if plan.rebind_textures {
            self.stale.iter_mut().for_each(|stale| *stale = true);
        }
        if self.stale[slot] {
            self.write_descriptor_set(slot);
            self.stale[slot] = false;
        }

        self.record_buffer_updates(command_buffer, slot, scene, &plan, uniform)
    }

    fn upload_textures(&mut self, command_pool: &CommandPool, scene: &Scene, plan: &SyncPlan) -> RenderResult<()> {
        for texture in &scene.textures(TextureKind::Texture2D)[plan.upload_2d.clone()] {
            let image = Image::from_image_data(&self.gpu, command_pool, TextureKind::Texture2D, &texture.image)?;
            self.textures_2d.push(image);
        }
        for texture in &scene.textures(TextureKind::Cube)[plan.upload_cube.clone()] {
            let image = Image::from_image_data(&self.gpu, command_pool, TextureKind::Cube, &texture.image)?;
            self.textures_cube.push(image);
        }
        if !(plan.upload_2d.is_empty() && plan.upload_cube.is_empty()) {
            log::debug!(
                "Uploaded {} 2-D and {} cube textures",
                plan.upload_2d.len(),
                plan.upload_cube.len()
            );
        }
        Ok(())
    }

    /// Whole-array replace; slots past the uploaded textures get the placeholder
    fn write_descriptor_set(&self, slot: usize) {
        let set = self.sets[slot];
        let views_2d = (0..self.limits.max_textures_2d).map(|i| {
            self.textures_2d
                .get(i)
                .unwrap_or(&self.placeholder_2d)
                .view()
        });
        let views_cube = (0..self.limits.max_textures_cube).map(|i| {
            self.textures_cube
                .get(i)
                .unwrap_or(&self.placeholder_cube)
                .view()
        });

        DescriptorSetWriter::new()
            .write_buffer(set, 0, vk::DescriptorType::UNIFORM_BUFFER, self.scene_buffer.handle())
            .write_buffer(set, 1, vk::DescriptorType::STORAGE_BUFFER, self.object_buffer.handle())
            .write_image_array(
                set,
                2,
                views_2d,
                self.sampler_2d.handle(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
            .write_image_array(
                set,
                3,
                views_cube,
                self.sampler_cube.handle(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
            .update(&self.gpu.device);
        log::trace!("Refreshed descriptor set of frame slot {}", slot);
    }

    fn record_buffer_updates(
        &self,
        command_buffer: vk::CommandBuffer,
        slot: usize,
        scene: &Scene,
        plan: &SyncPlan,
        uniform: &SceneUniform,
    ) -> RenderResult<()> {
        let staging = &self.staging[slot];
        let uniform_offset = self.object_buffer.size();

        let mut object_copies = Vec::new();
        for run in contiguous_runs(&plan.objects) {
            let records: Vec<ObjectData> = run
                .clone()
                .map(|index| {
                    scene
                        .entities()
                        .by_index(index)
                        .map_or_else(ObjectData::zeroed, |entity| {
                            ObjectData::from_entity(entity, scene.materials())
                        })
                })
                .collect();
            let copy = object_copy(&run);
            staging.write(copy.src_offset, &records)?;
            object_copies.push(copy);
        }
        staging.write(uniform_offset, std::slice::from_ref(uniform))?;

        let device = &self.gpu.device;
        let buffers = [self.object_buffer.handle(), self.scene_buffer.handle()];
        let shader_stages = vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER;
        let shader_access = vk::AccessFlags::SHADER_READ | vk::AccessFlags::UNIFORM_READ;

        unsafe {
            buffer_barrier(
                device,
                command_buffer,
                &buffers,
                (shader_stages, shader_access),
                (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE),
            );

            if plan.zero_buffers {
                for buffer in buffers {
                    device.cmd_fill_buffer(command_buffer, buffer, 0, vk::WHOLE_SIZE, 0);
                }
                buffer_barrier(
                    device,
                    command_buffer,
                    &buffers,
                    (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE),
                    (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE),
                );
            }

            if !object_copies.is_empty() {
                device.cmd_copy_buffer(command_buffer, staging.handle(), self.object_buffer.handle(), &object_copies);
            }
            device.cmd_copy_buffer(
                command_buffer,
                staging.handle(),
                self.scene_buffer.handle(),
                &[vk::BufferCopy {
                    src_offset: uniform_offset,
                    dst_offset: 0,
                    size: UNIFORM_SIZE,
                }],
            );

            buffer_barrier(
                device,
                command_buffer,
                &buffers,
                (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE),
                (shader_stages, shader_access),
            );
        }
        Ok(())
    }
}

/// Record a buffer memory barrier over whole buffers
unsafe fn buffer_barrier(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    buffers: &[vk::Buffer],
    (src_stage, src_access): (vk::PipelineStageFlags, vk::AccessFlags),
    (dst_stage, dst_access): (vk::PipelineStageFlags, vk::AccessFlags),
) {
    let barriers: Vec<vk::BufferMemoryBarrier> = buffers
        .iter()
        .map(|&buffer| {
            vk::BufferMemoryBarrier::builder()
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(buffer)
                .offset(0)
                .size(vk::WHOLE_SIZE)
                .build()
        })
        .collect();
    device.cmd_pipeline_barrier(
        command_buffer,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &barriers,
        &[],
    );
}

/// Consume the scene's dirty state into a plan against what is already on
/// the device. `uploaded` counts 2-D and cube textures.
fn take_plan(
    scene: &mut Scene,
    first_frame: bool,
    (uploaded_2d, uploaded_cube): (usize, usize),
    limits: &SceneConfig,
) -> RenderResult<SyncPlan> {
    let status = scene.take_status();
    let updated = scene.take_updated();
    SyncPlan::new(
        &SyncInput {
            status,
            first_frame,
            updated: &updated,
            object_count: scene.entities().len(),
            textures_2d: scene.textures(TextureKind::Texture2D).len(),
            textures_cube: scene.textures(TextureKind::Cube).len(),
            uploaded_2d,
            uploaded_cube,
        },
        limits,
    )
}

/// Staging-to-device copy of a run of object records; staging mirrors the
/// object buffer layout so both offsets match
fn object_copy(run: &Range<u32>) -> vk::BufferCopy {
    let offset = vk::DeviceSize::from(run.start) * OBJECT_SIZE;
    vk::BufferCopy {
        src_offset: offset,
        dst_offset: offset,
        size: vk::DeviceSize::from(run.end - run.start) * OBJECT_SIZE,
    }
}

/// Split ascending indices into runs of consecutive values
fn contiguous_runs(indices: &[u32]) -> Vec<Range<u32>> {
    let mut runs: Vec<Range<u32>> = Vec::new();
    for &index in indices {
        match runs.last_mut() {
            Some(run) if run.end == index => run.end += 1,
            _ => runs.push(index..index + 1),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::Transform;
    use crate::render::primitives::mesh::Primitive;
    use crate::scene::{Material, Texture};

    fn limits() -> SceneConfig {
        SceneConfig {
            max_entities: 16,
            max_objects: 16,
            max_textures_2d: 2,
            max_textures_cube: 1,
        }
    }

    fn add_cubes(scene: &mut Scene, count: usize) {
        let material = scene.add_material(Material::default());
        for i in 0..count {
            scene
                .add_object(&format!("Cube{}", i), Transform::identity(), Primitive::Cube, material)
                .unwrap();
        }
    }

    #[test]
    fn test_contiguous_runs() {
        assert_eq!(contiguous_runs(&[0, 1, 2, 5, 7, 8]), vec![0..3, 5..6, 7..9]);
        assert!(contiguous_runs(&[]).is_empty());
    }

    #[test]
    fn test_object_copy_matches_staging_layout() {
        let copy = object_copy(&(3..5));
        assert_eq!(copy.src_offset, 3 * OBJECT_SIZE);
        assert_eq!(copy.dst_offset, copy.src_offset);
        assert_eq!(copy.size, 2 * OBJECT_SIZE);
    }

    #[test]
    fn test_plan_after_clear_rewrites_new_objects_from_zero() {
        let limits = limits();
        let mut scene = Scene::new(&limits);
        add_cubes(&mut scene, 3);
        let first = take_plan(&mut scene, true, (0, 0), &limits).unwrap();
        assert_eq!(contiguous_runs(&first.objects), vec![0..3]);

        scene.clear();
        add_cubes(&mut scene, 2);
        let plan = take_plan(&mut scene, false, (0, 0), &limits).unwrap();

        assert!(plan.zero_buffers);
        assert!(plan.destroy_textures);
        assert_eq!(plan.objects, vec![0, 1]);
        let runs = contiguous_runs(&plan.objects);
        assert_eq!(runs, vec![0..2]);
        let copy = object_copy(&runs[0]);
        assert_eq!(copy.dst_offset, 0);
        assert_eq!(copy.size, 2 * OBJECT_SIZE);

        // Dirty state was consumed
        assert!(take_plan(&mut scene, false, (0, 0), &limits).unwrap().is_idle());
    }

    #[test]
    fn test_plan_after_texture_add_rebinds_and_uploads_only_new() {
        let limits = limits();
        let mut scene = Scene::new(&limits);
        add_cubes(&mut scene, 1);
        take_plan(&mut scene, true, (0, 0), &limits).unwrap();

        let kind = TextureKind::Texture2D;
        scene
            .add_texture_2d(Texture::from_image("t", kind, ImageData::solid([0; 4], kind.layer_count())))
            .unwrap();
        let plan = take_plan(&mut scene, false, (0, 0), &limits).unwrap();
        assert!(plan.rebind_textures);
        assert!(!plan.destroy_textures);
        assert_eq!(plan.upload_2d, 0..1);
        assert!(plan.upload_cube.is_empty());

        scene
            .add_texture_2d(Texture::from_image("u", kind, ImageData::solid([0; 4], kind.layer_count())))
            .unwrap();
        let plan = take_plan(&mut scene, false, (1, 0), &limits).unwrap();
        assert!(plan.rebind_textures);
        assert_eq!(plan.upload_2d, 1..2);
        assert!(plan.objects.is_empty());
    }
}
