//! Frame orchestration
//!
//! [`RenderPipeline`] owns the frame slots, the shared render targets, the
//! scene synchronizer and the five passes. [`RenderPipeline::render`] runs
//! one frame:
//!
//! 1. wait for the frame slot's fence and collect its pass timings
//! 2. acquire the presentable image
//! 3. recreate size-dependent targets when the target changed
//! 4. upload geometry, update the camera, sync the scene, cull
//! 5. record each pass behind the barriers its declared accesses require
//! 6. move the output to `Present`, submit and present

use ash::vk;
use ash::vk::Handle;

use crate::core::{RenderConfig, SceneConfig};
use crate::foundation::math::Mat4;
use crate::render::backends::vulkan::{
    begin_one_time, AcquiredImage, CommandPool, FrameSync, GpuDevice, Swapchain, TimestampQueries, VulkanError,
    VulkanResult,
};
use crate::render::error::RenderResult;
use crate::render::geometry::GeometryBuffers;
use crate::render::graph::{ResourceId, ResourceState, ResourceTracker, Transition};
use crate::render::passes::{
    light_view_projection, AntiAliasPass, ForwardPass, FrameInfo, PassContext, PassInit, PassSlot, RenderPassNode,
    RenderTargets, ShadowPass, SkyboxPass, SsrPass,
};
use crate::render::primitives::Camera;
use crate::render::sync::{SceneSynchronizer, SceneUniform};
use crate::scene::{CullSettings, Culler, Scene};

/// Presentable images the pipeline renders into
pub trait RenderTarget {
    /// Size of the images
    fn extent(&self) -> vk::Extent2D;

    /// Image format
    fn format(&self) -> vk::Format;

    /// Image handles, indexed by acquired image index
    fn images(&self) -> &[vk::Image];

    /// Image views, indexed by acquired image index
    fn image_views(&self) -> &[vk::ImageView];

    /// Changes whenever the image set is recreated
    fn identity(&self) -> u64;

    /// Acquire the next image, signalling `semaphore` when it is ready
    fn acquire(&self, semaphore: vk::Semaphore) -> VulkanResult<AcquiredImage>;

    /// Present image `index` after `wait_semaphore`; true when the target
    /// should be recreated
    fn present(&self, queue: vk::Queue, index: u32, wait_semaphore: vk::Semaphore) -> VulkanResult<bool>;
}

impl RenderTarget for Swapchain {
    fn extent(&self) -> vk::Extent2D {
        Swapchain::extent(self)
    }

    fn format(&self) -> vk::Format {
        Swapchain::format(self).format
    }

    fn images(&self) -> &[vk::Image] {
        Swapchain::images(self)
    }

    fn image_views(&self) -> &[vk::ImageView] {
        Swapchain::image_views(self)
    }

    fn identity(&self) -> u64 {
        self.handle().as_raw()
    }

    fn acquire(&self, semaphore: vk::Semaphore) -> VulkanResult<AcquiredImage> {
        self.acquire_next_image(semaphore)
    }

    fn present(&self, queue: vk::Queue, index: u32, wait_semaphore: vk::Semaphore) -> VulkanResult<bool> {
        Swapchain::present(self, queue, index, wait_semaphore)
    }
}

/// GPU time of one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassTiming {
    /// Which pass
    pub slot: PassSlot,
    /// Milliseconds between the pass's begin and end stamps
    pub ms: f32,
}

/// What happened during one [`RenderPipeline::render`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Pass timings of the last completed frame that used this slot
    pub pass_timings: Vec<PassTiming>,
    /// Meshes that survived culling
    pub visible: usize,
    /// Meshes in the scene
    pub meshes: usize,
    /// The target is out of date or suboptimal and should be recreated
    pub target_stale: bool,
    /// A frame was submitted
    pub rendered: bool,
}

impl FrameStats {
    /// Sum of all pass timings
    pub fn total_ms(&self) -> f32 {
        self.pass_timings.iter().map(|timing| timing.ms).sum()
    }
}

/// Extent and identity of the target the size-dependent objects were built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TargetKey {
    width: u32,
    height: u32,
    identity: u64,
}

impl TargetKey {
    fn of(target: &impl RenderTarget) -> Self {
        let extent = target.extent();
        Self {
            width: extent.width,
            height: extent.height,
            identity: target.identity(),
        }
    }
}

/// Shadow, skybox, forward, SSR and resolve passes over shared targets
pub struct RenderPipeline {
    passes: Vec<Box<dyn RenderPassNode>>,
    timestamps: Option<TimestampQueries>,
    synchronizer: SceneSynchronizer,
    geometry: GeometryBuffers,
    targets: RenderTargets,
    frame_sync: Vec<FrameSync>,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    tracker: ResourceTracker,
    culler: Culler,
    config: RenderConfig,
    limits: SceneConfig,
    target_key: TargetKey,
    output_format: vk::Format,
    frame_slot: usize,
    gpu: GpuDevice,
}

impl RenderPipeline {
    /// Build every pass for `target`; shader or pipeline failures are returned
    pub fn new(
        gpu: &GpuDevice,
        config: &RenderConfig,
        limits: &SceneConfig,
        target: &impl RenderTarget,
    ) -> RenderResult<Self> {
        let slots = config.frames_in_flight.max(1);
        let command_pool = CommandPool::new(gpu.device.clone(), gpu.graphics_family)?;
        let command_buffers = command_pool.allocate_command_buffers(slots as u32)?;
        let frame_sync = (0..slots)
            .map(|_| FrameSync::new(gpu.device.clone()))
            .collect::<Result<Vec<_>, VulkanError>>()?;

        let synchronizer = SceneSynchronizer::new(gpu, &command_pool, limits, slots)?;
        let geometry = GeometryBuffers::new(gpu, &command_pool)?;
        let targets = RenderTargets::new(gpu, target.extent(), config.shadow_map_resolution)?;
        let timestamps = TimestampQueries::new(gpu, slots, PassSlot::ALL.len())?;

        let mut pipeline = Self {
            passes: vec![
                Box::new(ShadowPass::new()),
                Box::new(SkyboxPass::new()),
                Box::new(ForwardPass::new()),
                Box::new(SsrPass::new()),
                Box::new(AntiAliasPass::new()),
            ],
            timestamps,
            synchronizer,
            geometry,
            targets,
            frame_sync,
            command_buffers,
            command_pool,
            tracker: ResourceTracker::new(),
            culler: Culler::new(CullSettings::from(config)),
            config: config.clone(),
            limits: limits.clone(),
            target_key: TargetKey::of(target),
            output_format: target.format(),
            frame_slot: 0,
            gpu: gpu.clone(),
        };
        pipeline.initialize_passes(target.image_views())?;

        log::info!(
            "Render pipeline ready: {}x{}, {} frames in flight, SSR {}, shadow map {}",
            pipeline.target_key.width,
            pipeline.target_key.height,
            slots,
            if config.ssr_enabled { "on" } else { "off" },
            config.shadow_map_resolution
        );
        Ok(pipeline)
    }

    /// Render settings in use
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Replace the culling switches
    pub fn set_cull_settings(&mut self, settings: CullSettings) {
        self.config.frustum_culling = settings.frustum_culling;
        self.config.distance_sort = settings.distance_sort;
        self.culler.set_settings(settings);
    }

    /// Enable or disable the SSR pass
    pub fn set_ssr_enabled(&mut self, enabled: bool) {
        self.config.ssr_enabled = enabled;
    }

    /// Record and submit one frame of `scene` into `target`
    pub fn render(&mut self, target: &impl RenderTarget, scene: &mut Scene) -> RenderResult<FrameStats> {
        let slot = self.frame_slot;
        let mut stats = FrameStats::default();

        self.frame_sync[slot].wait_until_free()?;
        if let Some(timestamps) = &self.timestamps {
            if let Some(ms) = timestamps.read(slot)? {
                stats.pass_timings = PassSlot::ALL
                    .iter()
                    .zip(ms)
                    .map(|(&slot, ms)| PassTiming { slot, ms })
                    .collect();
            }
        }

        let image_index = match target.acquire(self.frame_sync[slot].acquire_semaphore())? {
            AcquiredImage::OutOfDate => {
                log::debug!("Render target out of date, skipping frame");
                stats.target_stale = true;
                return Ok(stats);
            }
            AcquiredImage::Ready { index, suboptimal } => {
                stats.target_stale = suboptimal;
                index
            }
        };

        self.prepare_target(target)?;
        self.geometry.update(&self.command_pool, scene)?;

        let extent = target.extent();
        let camera = prepare_camera(scene, extent);
        let light_view_projection = scene
            .directional_light()
            .map_or_else(Mat4::identity, |(_, light)| light_view_projection(light, &scene.scene_aabb()));
        let frame = FrameInfo {
            shadows: scene
                .directional_light()
                .is_some_and(|(_, light)| light.shadow.enabled),
            skybox: scene.ambient_light().map(|ambient| ambient.skybox_texture()),
            ssr: self.config.ssr_enabled,
            anti_aliasing: self.config.anti_aliasing,
            clear_color: self.config.clear_color,
        };
        let uniform = SceneUniform::build(
            scene,
            &camera,
            (extent.width, extent.height),
            &light_view_projection,
            self.config.shadow_map_resolution,
            frame.shadows,
        );

        let device = &self.gpu.device;
        let command_buffer = self.command_buffers[slot];
        begin_one_time(device, command_buffer)?;
        self.synchronizer
            .sync(command_buffer, slot, &self.command_pool, scene, &uniform)?;

        let draw_list = self.culler.cull(scene.entities(), &camera);
        let shadow_casters = self.culler.shadow_casters(scene.entities());
        stats.visible = draw_list.len();
        stats.meshes = shadow_casters.len();

        record_frame_barrier(device, command_buffer);
        self.tracker.reset(ResourceId::Output);
        if let Some(timestamps) = &mut self.timestamps {
            timestamps.reset(command_buffer, slot);
        }

        let output_image = target
            .images()
            .get(image_index as usize)
            .copied()
            .unwrap_or_else(vk::Image::null);
        let ctx = PassContext {
            device,
            command_buffer,
            image_index: image_index as usize,
            scene,
            draw_list: &draw_list,
            shadow_casters: &shadow_casters,
            geometry: &self.geometry,
            scene_set: self.synchronizer.descriptor_set(slot),
            frame,
        };

        for (index, pass) in self.passes.iter_mut().enumerate() {
            if let Some(timestamps) = &self.timestamps {
                timestamps.begin(command_buffer, slot, index);
            }
            if pass.should_run(&frame) {
                let transitions = self.tracker.transitions_for(&pass.accesses(&frame));
                record_transitions(device, command_buffer, &transitions, &self.targets, output_image);
                pass.record(&ctx)?;
            }
            if let Some(timestamps) = &self.timestamps {
                timestamps.end(command_buffer, slot, index);
            }
        }

        if let Some(transition) = self.tracker.finish() {
            record_transitions(device, command_buffer, &[transition], &self.targets, output_image);
        }
        unsafe { device.end_command_buffer(command_buffer).map_err(VulkanError::Api)? };

        let sync = &self.frame_sync[slot];
        sync.submit(self.gpu.graphics_queue, command_buffer)?;
        if let Some(timestamps) = &mut self.timestamps {
            timestamps.mark_submitted(slot);
        }

        if target.present(self.gpu.present_queue, image_index, sync.present_semaphore())? {
            stats.target_stale = true;
        }
        stats.rendered = true;
        self.frame_slot = (slot + 1) % self.frame_sync.len();
        Ok(stats)
    }

    /// Recreate the size-dependent targets and pass objects for `target`
    /// now instead of on the next frame
    pub fn resize(&mut self, target: &impl RenderTarget) -> RenderResult<()> {
        self.gpu.wait_idle()?;
        let extent = target.extent();
        self.targets.resize(extent)?;
        self.output_format = target.format();
        self.target_key = TargetKey::of(target);

        for resource in [
            ResourceId::BaseColor,
            ResourceId::Normal,
            ResourceId::Specular,
            ResourceId::Depth,
            ResourceId::Reflection,
            ResourceId::Output,
        ] {
            self.tracker.reset(resource);
        }

        let init = PassInit {
            gpu: &self.gpu,
            config: &self.config,
            limits: &self.limits,
            scene_layout: self.synchronizer.layout(),
            targets: &self.targets,
            output_format: self.output_format,
            output_views: target.image_views(),
        };
        for pass in &mut self.passes {
            pass.resize(&init)?;
        }
        log::info!("Render pipeline resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Rebuild every pass from scratch, reloading shaders from disk
    pub fn recompile(&mut self, target: &impl RenderTarget) -> RenderResult<()> {
        self.gpu.wait_idle()?;
        for pass in &mut self.passes {
            pass.release();
        }
        if TargetKey::of(target) != self.target_key {
            self.targets.resize(target.extent())?;
            self.target_key = TargetKey::of(target);
            self.output_format = target.format();
        }
        self.tracker.reset_all();
        self.initialize_passes(target.image_views())?;
        log::info!("Render pipeline recompiled");
        Ok(())
    }

    fn prepare_target(&mut self, target: &impl RenderTarget) -> RenderResult<()> {
        if TargetKey::of(target) == self.target_key {
            return Ok(());
        }
        self.resize(target)
    }

    fn initialize_passes(&mut self, output_views: &[vk::ImageView]) -> RenderResult<()> {
        let init = PassInit {
            gpu: &self.gpu,
            config: &self.config,
            limits: &self.limits,
            scene_layout: self.synchronizer.layout(),
            targets: &self.targets,
            output_format: self.output_format,
            output_views,
        };
        for pass in &mut self.passes {
            pass.initialize(&init)?;
            log::debug!("Initialized {} pass", pass.slot().name());
        }
        Ok(())
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        if let Err(error) = self.gpu.wait_idle() {
            log::error!("Device wait failed while dropping the render pipeline: {}", error);
        }
    }
}

/// Fit the scene camera (or a default one) to the target aspect ratio
fn prepare_camera(scene: &mut Scene, extent: vk::Extent2D) -> Camera {
    let aspect = extent.width.max(1) as f32 / extent.height.max(1) as f32;
    let update = |camera: &mut Camera| {
        camera.set_aspect_ratio(aspect);
        camera.update_frustum();
    };
    match scene.camera_mut() {
        Some(camera) => {
            update(camera);
            camera.clone()
        }
        None => {
            let mut camera = Camera::default();
            update(&mut camera);
            camera
        }
    }
}

/// Order this frame's attachment and shader accesses after the previous
/// frame's, which may still be executing on the same images
fn record_frame_barrier(device: &ash::Device, command_buffer: vk::CommandBuffer) {
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        | vk::PipelineStageFlags::FRAGMENT_SHADER;
    let barrier = vk::MemoryBarrier::builder()
        .src_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
                | vk::AccessFlags::SHADER_READ,
        )
        .build();
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            stages,
            stages,
            vk::DependencyFlags::empty(),
            &[barrier],
            &[],
            &[],
        );
    }
}

/// Source and destination stages of a transition; the output's first
/// transition must wait for the acquire semaphore's stage
fn transition_stages(transition: &Transition) -> (vk::PipelineStageFlags, vk::PipelineStageFlags) {
    let (src, dst) = transition.stages();
    if transition.resource == ResourceId::Output && transition.from == ResourceState::Undefined {
        (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, dst)
    } else {
        (src, dst)
    }
}

fn record_transitions(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    transitions: &[Transition],
    targets: &RenderTargets,
    output_image: vk::Image,
) {
    for transition in transitions {
        let image = match targets.image(transition.resource) {
            Some(image) => image.handle(),
            None => output_image,
        };
        let (src_stage, dst_stage) = transition_stages(transition);
        log::trace!(
            "{:?}: {:?} -> {:?}",
            transition.resource,
            transition.from,
            transition.to
        );
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[transition.image_barrier(image)],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_waits_for_acquire_stage() {
        let transition = Transition {
            resource: ResourceId::Output,
            from: ResourceState::Undefined,
            to: ResourceState::ColorAttachment,
        };
        let (src, dst) = transition_stages(&transition);
        assert_eq!(src, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dst, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);

        let transition = Transition {
            resource: ResourceId::BaseColor,
            from: ResourceState::Undefined,
            to: ResourceState::ColorAttachment,
        };
        assert_eq!(transition_stages(&transition).0, vk::PipelineStageFlags::TOP_OF_PIPE);
    }

    #[test]
    fn test_frame_stats_total() {
        let stats = FrameStats {
            pass_timings: vec![
                PassTiming {
                    slot: PassSlot::Shadow,
                    ms: 0.5,
                },
                PassTiming {
                    slot: PassSlot::Forward,
                    ms: 1.25,
                },
            ],
            ..Default::default()
        };
        approx::assert_relative_eq!(stats.total_ms(), 1.75);
    }

    #[test]
    fn test_pass_order_tracks_expected_states() {
        // Shadow, skybox, forward, SSR and resolve in order
        let frame = FrameInfo {
            shadows: true,
            skybox: Some(None),
            ssr: true,
            anti_aliasing: true,
            clear_color: [0.0; 4],
        };
        let passes: Vec<Box<dyn RenderPassNode>> = vec![
            Box::new(ShadowPass::new()),
            Box::new(SkyboxPass::new()),
            Box::new(ForwardPass::new()),
            Box::new(SsrPass::new()),
            Box::new(AntiAliasPass::new()),
        ];
        let mut tracker = ResourceTracker::new();
        for pass in &passes {
            assert!(pass.should_run(&frame));
            tracker.transitions_for(&pass.accesses(&frame));
        }

        assert_eq!(tracker.state(ResourceId::ShadowMap), ResourceState::DepthShaderRead);
        assert_eq!(tracker.state(ResourceId::BaseColor), ResourceState::ShaderRead);
        assert_eq!(tracker.state(ResourceId::Depth), ResourceState::DepthShaderRead);
        assert_eq!(tracker.state(ResourceId::Reflection), ResourceState::ShaderRead);
        assert_eq!(tracker.state(ResourceId::Output), ResourceState::ColorAttachment);

        let last = tracker.finish().unwrap();
        assert_eq!(last.to, ResourceState::Present);
    }

    #[test]
    fn test_skybox_and_base_color_need_no_transition_in_forward() {
        let frame = FrameInfo {
            shadows: false,
            skybox: Some(None),
            ssr: false,
            anti_aliasing: false,
            clear_color: [0.0; 4],
        };
        let mut tracker = ResourceTracker::new();
        tracker.transitions_for(&SkyboxPass::new().accesses(&frame));
        let forward = tracker.transitions_for(&ForwardPass::new().accesses(&frame));
        assert!(forward.iter().all(|t| t.resource != ResourceId::BaseColor));
    }
}
