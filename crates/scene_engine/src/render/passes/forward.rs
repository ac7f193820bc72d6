//! Lit geometry
//!
//! Writes lit color, view-space normals, specular parameters and depth for
//! every visible mesh. Set 1 carries the shadow map with a depth-compare
//! sampler.

use ash::vk;

use crate::render::backends::vulkan::{
    ActiveRenderPass, AttachmentSpec, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorSetWriter, Framebuffer, GraphicsPipeline, GraphicsPipelineBuilder, RenderPass,
};
use crate::render::error::RenderResult;
use crate::render::graph::{ResourceAccess, ResourceId};

use super::targets::{DEPTH_FORMAT, HDR_FORMAT, SPECULAR_FORMAT};
use super::{draw_meshes, DrawConstants, FrameInfo, Lifecycle, PassContext, PassInit, PassSlot, PassState, RenderPassNode};

/// Color attachments in output order
const COLOR_TARGETS: [(ResourceId, vk::Format); 3] = [
    (ResourceId::BaseColor, HDR_FORMAT),
    (ResourceId::Normal, HDR_FORMAT),
    (ResourceId::Specular, SPECULAR_FORMAT),
];

fn attachments(base_color_load: vk::AttachmentLoadOp) -> [AttachmentSpec; 4] {
    [
        AttachmentSpec::color(COLOR_TARGETS[0].1, base_color_load),
        AttachmentSpec::color(COLOR_TARGETS[1].1, vk::AttachmentLoadOp::CLEAR),
        AttachmentSpec::color(COLOR_TARGETS[2].1, vk::AttachmentLoadOp::CLEAR),
        AttachmentSpec::depth(DEPTH_FORMAT, vk::AttachmentLoadOp::CLEAR),
    ]
}

struct ForwardResources {
    // Clears base color; used when the skybox did not run
    clear_pass: RenderPass,
    // Keeps the skybox output
    load_pass: RenderPass,
    framebuffer: Framebuffer,
    pipeline: GraphicsPipeline,
    shadow_set: vk::DescriptorSet,
    _shadow_pool: DescriptorPool,
    _shadow_layout: DescriptorSetLayout,
}

/// Forward shading of the camera draw list
#[derive(Default)]
pub struct ForwardPass {
    lifecycle: Lifecycle<ForwardResources>,
}

impl ForwardPass {
    /// Uninitialized pass
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderPassNode for ForwardPass {
    fn slot(&self) -> PassSlot {
        PassSlot::Forward
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, init: &PassInit<'_>) -> RenderResult<()> {
        let device = &init.gpu.device;
        let clear_pass = RenderPass::new(device, &attachments(vk::AttachmentLoadOp::CLEAR))?;
        let load_pass = RenderPass::new(device, &attachments(vk::AttachmentLoadOp::LOAD))?;

        // Both passes are compatible, so one framebuffer and pipeline serve both
        let views = [
            init.targets.view(ResourceId::BaseColor),
            init.targets.view(ResourceId::Normal),
            init.targets.view(ResourceId::Specular),
            init.targets.view(ResourceId::Depth),
        ];
        let framebuffer = Framebuffer::new(device, &clear_pass, &views, init.targets.extent())?;

        let shadow_layout = DescriptorSetLayoutBuilder::new()
            .add_combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .build(device)?;
        let shadow_pool = DescriptorPool::for_layout(device, &shadow_layout, 1)?;
        let shadow_set = shadow_pool.allocate_descriptor_sets(&[shadow_layout.handle()])?[0];
        DescriptorSetWriter::new()
            .write_image(
                shadow_set,
                0,
                init.targets.view(ResourceId::ShadowMap),
                init.targets.shadow_sampler(),
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            )
            .update(device);

        let vertex = init.shader("forward.vert.spv")?;
        let fragment = init.shader("forward.frag.spv")?;
        let pipeline = GraphicsPipelineBuilder::new(&vertex)
            .fragment(&fragment)
            .cull_mode(vk::CullModeFlags::BACK)
            .depth(true, true)
            .color_attachments(COLOR_TARGETS.len() as u32)
            .push_constants(DrawConstants::SIZE)
            .set_layouts(&[init.scene_layout, shadow_layout.handle()])
            .specialization(&init.texture_array_sizes())
            .build(device, clear_pass.handle())?;

        self.lifecycle.set(ForwardResources {
            clear_pass,
            load_pass,
            framebuffer,
            pipeline,
            shadow_set,
            _shadow_pool: shadow_pool,
            _shadow_layout: shadow_layout,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.lifecycle.release();
    }

    fn should_run(&self, _frame: &FrameInfo) -> bool {
        true
    }

    fn accesses(&self, _frame: &FrameInfo) -> Vec<ResourceAccess> {
        vec![
            ResourceAccess::read(ResourceId::ShadowMap),
            ResourceAccess::write(ResourceId::BaseColor),
            ResourceAccess::write(ResourceId::Normal),
            ResourceAccess::write(ResourceId::Specular),
            ResourceAccess::write(ResourceId::Depth),
        ]
    }

    fn record(&mut self, ctx: &PassContext<'_>) -> RenderResult<()> {
        self.lifecycle.render(PassSlot::Forward, |resources| {
            let color = |float32| vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            };
            let clear = [
                color(ctx.frame.clear_color),
                color([0.0; 4]),
                color([0.0; 4]),
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                },
            ];
            let render_pass = if ctx.frame.skybox_drawn() {
                &resources.load_pass
            } else {
                &resources.clear_pass
            };

            let mut pass =
                ActiveRenderPass::begin(ctx.device, ctx.command_buffer, render_pass, &resources.framebuffer, &clear);
            pass.bind_pipeline(&resources.pipeline);
            pass.bind_descriptor_sets(&resources.pipeline, 0, &[ctx.scene_set, resources.shadow_set]);
            let draws = draw_meshes(&mut pass, &resources.pipeline, ctx, ctx.draw_list);
            log::trace!("Forward pass: {} draws", draws);
            Ok(())
        })
    }
}
