//! Render passes
//!
//! ```text
//! Shadow -> Skybox -> Forward -> SSR -> AntiAliasing
//! ```
//!
//! Every pass implements [`RenderPassNode`]: it is built from a
//! [`PassInit`], declares the shared images it touches for the current
//! frame and records its draws into the frame command buffer. The pipeline
//! records the layout transitions between passes from those declarations.

pub mod antialias;
pub mod forward;
pub mod shadow;
pub mod skybox;
pub mod ssr;
pub mod targets;

use ash::{vk, Device};

use crate::core::{RenderConfig, SceneConfig};
use crate::ecs::components::MeshComponent;
use crate::render::backends::vulkan::{ActiveRenderPass, GpuDevice, GraphicsPipeline, ShaderModule};
use crate::render::error::{RenderError, RenderResult};
use crate::render::geometry::GeometryBuffers;
use crate::render::graph::ResourceAccess;
use crate::scene::{DrawList, Scene, TextureId};

pub use antialias::AntiAliasPass;
pub use forward::ForwardPass;
pub use shadow::{light_view_projection, ShadowPass};
pub use skybox::SkyboxPass;
pub use ssr::SsrPass;
pub use targets::RenderTargets;

/// Position of a pass in the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassSlot {
    /// Directional shadow map
    Shadow,
    /// Environment background
    Skybox,
    /// Lit geometry
    Forward,
    /// Screen-space reflections
    Ssr,
    /// Resolve into the presentable image
    AntiAlias,
}

impl PassSlot {
    /// Every pass in execution order
    pub const ALL: [Self; 5] = [Self::Shadow, Self::Skybox, Self::Forward, Self::Ssr, Self::AntiAlias];

    /// Display name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Shadow => "shadow",
            Self::Skybox => "skybox",
            Self::Forward => "forward",
            Self::Ssr => "ssr",
            Self::AntiAlias => "antialias",
        }
    }

    /// Index in [`PassSlot::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Lifecycle of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    /// No GPU objects exist
    #[default]
    Uninitialized,
    /// Pipelines and framebuffers exist
    Initialized,
    /// Currently recording
    Rendering,
}

/// Everything a pass needs to build its GPU objects
pub struct PassInit<'a> {
    /// Device handles
    pub gpu: &'a GpuDevice,
    /// Render settings
    pub config: &'a RenderConfig,
    /// Texture array sizes of set 0
    pub limits: &'a SceneConfig,
    /// Layout of the scene descriptor set (set 0)
    pub scene_layout: vk::DescriptorSetLayout,
    /// Shared render targets
    pub targets: &'a RenderTargets,
    /// Format of the presentable images
    pub output_format: vk::Format,
    /// Views of the presentable images
    pub output_views: &'a [vk::ImageView],
}

impl PassInit<'_> {
    /// Load a compiled shader by file name
    pub fn shader(&self, file_name: &str) -> RenderResult<ShaderModule> {
        let path = self.config.resolve_shader(file_name);
        if !path.exists() {
            return Err(RenderError::ShaderNotFound(path));
        }
        Ok(ShaderModule::from_file(&self.gpu.device, &path)?)
    }

    /// Specialization constants sizing the set 0 texture arrays
    pub fn texture_array_sizes(&self) -> [u32; 2] {
        [self.limits.max_textures_2d as u32, self.limits.max_textures_cube as u32]
    }
}

/// What runs this frame, decided before any pass records
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// A directional light with shadows enabled exists
    pub shadows: bool,
    /// Cube texture drawn as the skybox, when an ambient light exists
    pub skybox: Option<Option<TextureId>>,
    /// The SSR pass runs
    pub ssr: bool,
    /// Apply FXAA in the resolve
    pub anti_aliasing: bool,
    /// Clear color of the working color target
    pub clear_color: [f32; 4],
}

impl FrameInfo {
    /// An ambient light exists, so the skybox pass draws the background
    pub fn skybox_drawn(&self) -> bool {
        self.skybox.is_some()
    }
}

/// Per-frame recording state shared by all passes
pub struct PassContext<'a> {
    /// Logical device
    pub device: &'a Device,
    /// Frame command buffer
    pub command_buffer: vk::CommandBuffer,
    /// Swapchain image being rendered
    pub image_index: usize,
    /// Scene being drawn
    pub scene: &'a Scene,
    /// Camera-culled meshes
    pub draw_list: &'a DrawList,
    /// Every mesh, for the shadow pass
    pub shadow_casters: &'a DrawList,
    /// Vertex and index buffers
    pub geometry: &'a GeometryBuffers,
    /// Scene descriptor set of this frame slot
    pub scene_set: vk::DescriptorSet,
    /// Frame decisions
    pub frame: FrameInfo,
}

/// One stage of the render pipeline
pub trait RenderPassNode {
    /// Which pass this is
    fn slot(&self) -> PassSlot;

    /// Current lifecycle state
    fn state(&self) -> PassState;

    /// Create pipelines, framebuffers and descriptor sets
    fn initialize(&mut self, init: &PassInit<'_>) -> RenderResult<()>;

    /// Destroy every GPU object; the device must be idle
    fn release(&mut self);

    /// Rebuild size-dependent objects after the targets were recreated
    fn resize(&mut self, init: &PassInit<'_>) -> RenderResult<()> {
        self.release();
        self.initialize(init)
    }

    /// Whether the pass records this frame
    fn should_run(&self, frame: &FrameInfo) -> bool;

    /// Shared images used this frame and the states they must be in
    fn accesses(&self, frame: &FrameInfo) -> Vec<ResourceAccess>;

    /// Record the pass
    fn record(&mut self, ctx: &PassContext<'_>) -> RenderResult<()>;
}

/// Push constant block of mesh passes: object index plus one pass value
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawConstants {
    /// Slot in the object storage buffer
    pub object_index: u32,
    /// Pass specific (cube texture index for the skybox)
    pub value: i32,
    /// Unused
    pub _padding: [u32; 2],
}

impl DrawConstants {
    /// Size in bytes
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;
}

/// Draw every item of `list`, binding geometry pools as needed
pub(crate) fn draw_meshes(
    pass: &mut ActiveRenderPass<'_>,
    pipeline: &GraphicsPipeline,
    ctx: &PassContext<'_>,
    list: &DrawList,
) -> usize {
    let mut bound = None;
    let mut draws = 0;
    for item in list.iter() {
        let Some(mesh) = ctx
            .scene
            .entity(item.handle)
            .and_then(|entity| entity.get::<MeshComponent>())
        else {
            continue;
        };
        if bound != Some(mesh.source) {
            if !ctx.geometry.bind(pass, mesh.source) {
                continue;
            }
            bound = Some(mesh.source);
        }
        pass.push_constants(
            pipeline,
            &DrawConstants {
                object_index: item.object_index,
                ..Default::default()
            },
        );
        pass.draw_indexed(mesh.index_count, mesh.first_index, mesh.vertex_offset);
        draws += 1;
    }
    draws
}

/// Pass lifecycle bookkeeping shared by the pass implementations
#[derive(Debug)]
pub(crate) struct Lifecycle<T> {
    resources: Option<T>,
    rendering: bool,
}

impl<T> Default for Lifecycle<T> {
    fn default() -> Self {
        Self { resources: None, rendering: false }
    }
}

impl<T> Lifecycle<T> {
    pub(crate) fn state(&self) -> PassState {
        match (&self.resources, self.rendering) {
            (None, _) => PassState::Uninitialized,
            (Some(_), false) => PassState::Initialized,
            (Some(_), true) => PassState::Rendering,
        }
    }

    pub(crate) fn set(&mut self, resources: T) {
        self.resources = Some(resources);
    }

    pub(crate) fn release(&mut self) {
        self.resources = None;
        self.rendering = false;
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.resources.as_ref()
    }

    /// Run `record` in the Rendering state
    pub(crate) fn render(&mut self, slot: PassSlot, record: impl FnOnce(&T) -> RenderResult<()>) -> RenderResult<()> {
        let resources = self
            .resources
            .as_ref()
            .ok_or(RenderError::PassNotInitialized(slot.name()))?;
        self.rendering = true;
        let result = record(resources);
        self.rendering = false;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_order_and_names() {
        let names: Vec<&str> = PassSlot::ALL.iter().map(|slot| slot.name()).collect();
        assert_eq!(names, vec!["shadow", "skybox", "forward", "ssr", "antialias"]);
        assert_eq!(PassSlot::Ssr.index(), 3);
    }

    #[test]
    fn test_lifecycle_states() {
        let mut lifecycle: Lifecycle<u32> = Lifecycle::default();
        assert_eq!(lifecycle.state(), PassState::Uninitialized);
        assert!(matches!(
            lifecycle.render(PassSlot::Forward, |_| Ok(())),
            Err(RenderError::PassNotInitialized("forward"))
        ));

        lifecycle.set(7);
        assert_eq!(lifecycle.state(), PassState::Initialized);
        lifecycle
            .render(PassSlot::Forward, |value| {
                assert_eq!(*value, 7);
                Ok(())
            })
            .unwrap();
        assert_eq!(lifecycle.state(), PassState::Initialized);

        lifecycle.release();
        assert_eq!(lifecycle.state(), PassState::Uninitialized);
    }

    #[test]
    fn test_draw_constants_size() {
        assert_eq!(DrawConstants::SIZE, 16);
    }
}
