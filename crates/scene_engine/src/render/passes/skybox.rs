//! Environment background

use ash::vk;

use crate::ecs::components::GeometrySource;
use crate::render::backends::vulkan::{
    ActiveRenderPass, AttachmentSpec, Framebuffer, GraphicsPipeline, GraphicsPipelineBuilder, RenderPass,
};
use crate::render::error::RenderResult;
use crate::render::graph::{ResourceAccess, ResourceId};
use crate::render::primitives::Primitive;
use crate::render::sync::NO_TEXTURE;

use super::targets::HDR_FORMAT;
use super::{DrawConstants, FrameInfo, Lifecycle, PassContext, PassInit, PassSlot, PassState, RenderPassNode};

struct SkyboxResources {
    render_pass: RenderPass,
    framebuffer: Framebuffer,
    pipeline: GraphicsPipeline,
}

/// Draws the ambient light's cube texture behind everything else
///
/// Runs only while the scene has an ambient light. Without a cube texture
/// the background is filled with the ambient color.
#[derive(Default)]
pub struct SkyboxPass {
    lifecycle: Lifecycle<SkyboxResources>,
}

impl SkyboxPass {
    /// Uninitialized pass
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderPassNode for SkyboxPass {
    fn slot(&self) -> PassSlot {
        PassSlot::Skybox
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, init: &PassInit<'_>) -> RenderResult<()> {
        let device = &init.gpu.device;
        let render_pass = RenderPass::new(
            device,
            &[AttachmentSpec::color(HDR_FORMAT, vk::AttachmentLoadOp::CLEAR)],
        )?;
        let framebuffer = Framebuffer::new(
            device,
            &render_pass,
            &[init.targets.view(ResourceId::BaseColor)],
            init.targets.extent(),
        )?;

        let vertex = init.shader("skybox.vert.spv")?;
        let fragment = init.shader("skybox.frag.spv")?;
        // The camera sits inside the cube
        let pipeline = GraphicsPipelineBuilder::new(&vertex)
            .fragment(&fragment)
            .cull_mode(vk::CullModeFlags::FRONT)
            .depth(false, false)
            .push_constants(DrawConstants::SIZE)
            .set_layouts(&[init.scene_layout])
            .specialization(&init.texture_array_sizes())
            .build(device, render_pass.handle())?;

        self.lifecycle.set(SkyboxResources {
            render_pass,
            framebuffer,
            pipeline,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.lifecycle.release();
    }

    fn should_run(&self, frame: &FrameInfo) -> bool {
        frame.skybox_drawn()
    }

    fn accesses(&self, _frame: &FrameInfo) -> Vec<ResourceAccess> {
        vec![ResourceAccess::write(ResourceId::BaseColor)]
    }

    fn record(&mut self, ctx: &PassContext<'_>) -> RenderResult<()> {
        let cube = ctx.frame.skybox.flatten().map_or(NO_TEXTURE, |id| id.0 as i32);

        self.lifecycle.render(PassSlot::Skybox, |resources| {
            let clear = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: ctx.frame.clear_color,
                },
            }];
            let mut pass = ActiveRenderPass::begin(
                ctx.device,
                ctx.command_buffer,
                &resources.render_pass,
                &resources.framebuffer,
                &clear,
            );
            pass.bind_pipeline(&resources.pipeline);
            pass.bind_descriptor_sets(&resources.pipeline, 0, &[ctx.scene_set]);
            if !ctx.geometry.bind(&mut pass, GeometrySource::Template) {
                return Ok(());
            }

            let cube_mesh = Primitive::Cube.range();
            pass.push_constants(
                &resources.pipeline,
                &DrawConstants {
                    object_index: 0,
                    value: cube,
                    ..Default::default()
                },
            );
            pass.draw_indexed(cube_mesh.index_count, cube_mesh.first_index, cube_mesh.vertex_offset);
            Ok(())
        })
    }
}
