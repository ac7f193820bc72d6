//! Screen-space reflections

use ash::vk;

use crate::render::backends::vulkan::{
    ActiveRenderPass, AttachmentSpec, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorSetWriter, Framebuffer, GraphicsPipeline, GraphicsPipelineBuilder, RenderPass,
};
use crate::render::error::RenderResult;
use crate::render::graph::{ResourceAccess, ResourceId};

use super::targets::HDR_FORMAT;
use super::{FrameInfo, Lifecycle, PassContext, PassInit, PassSlot, PassState, RenderPassNode};

/// Inputs sampled by the reflection shader, in binding order
const INPUTS: [ResourceId; 4] = [
    ResourceId::BaseColor,
    ResourceId::Normal,
    ResourceId::Specular,
    ResourceId::Depth,
];

struct SsrResources {
    render_pass: RenderPass,
    framebuffer: Framebuffer,
    pipeline: GraphicsPipeline,
    input_set: vk::DescriptorSet,
    _input_pool: DescriptorPool,
    _input_layout: DescriptorSetLayout,
}

/// Ray-marches the depth buffer along reflected view rays
#[derive(Default)]
pub struct SsrPass {
    lifecycle: Lifecycle<SsrResources>,
}

impl SsrPass {
    /// Uninitialized pass
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderPassNode for SsrPass {
    fn slot(&self) -> PassSlot {
        PassSlot::Ssr
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
            &[init.targets.view(ResourceId::Reflection)],
            init.targets.extent(),
        )?;

        let input_layout = INPUTS
            .iter()
            .enumerate()
            .fold(DescriptorSetLayoutBuilder::new(), |builder, (binding, _)| {
                builder.add_combined_image_sampler(binding as u32, vk::ShaderStageFlags::FRAGMENT)
            })
            .build(device)?;
        let input_pool = DescriptorPool::for_layout(device, &input_layout, 1)?;
        let input_set = input_pool.allocate_descriptor_sets(&[input_layout.handle()])?[0];
        INPUTS
            .iter()
            .enumerate()
            .fold(DescriptorSetWriter::new(), |writer, (binding, &resource)| {
                writer.write_image(
                    input_set,
                    binding as u32,
                    init.targets.view(resource),
                    init.targets.linear_sampler(),
                    ResourceAccess::read(resource).state.layout(),
                )
            })
            .update(device);

        let vertex = init.shader("fullscreen.vert.spv")?;
        let fragment = init.shader("ssr.frag.spv")?;
        let pipeline = GraphicsPipelineBuilder::new(&vertex)
            .fragment(&fragment)
            .without_vertex_input()
            .cull_mode(vk::CullModeFlags::NONE)
            .depth(false, false)
            .set_layouts(&[init.scene_layout, input_layout.handle()])
            .specialization(&init.texture_array_sizes())
            .build(device, render_pass.handle())?;

        self.lifecycle.set(SsrResources {
            render_pass,
            framebuffer,
            pipeline,
            input_set,
            _input_pool: input_pool,
            _input_layout: input_layout,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.lifecycle.release();
    }

    fn should_run(&self, frame: &FrameInfo) -> bool {
        frame.ssr
    }

    fn accesses(&self, _frame: &FrameInfo) -> Vec<ResourceAccess> {
        let mut accesses: Vec<ResourceAccess> = INPUTS.iter().copied().map(ResourceAccess::read).collect();
        accesses.push(ResourceAccess::write(ResourceId::Reflection));
        accesses
    }

    fn record(&mut self, ctx: &PassContext<'_>) -> RenderResult<()> {
        self.lifecycle.render(PassSlot::Ssr, |resources| {
            let clear = [vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0; 4] },
            }];
            let mut pass = ActiveRenderPass::begin(
                ctx.device,
                ctx.command_buffer,
                &resources.render_pass,
                &resources.framebuffer,
                &clear,
            );
            pass.bind_pipeline(&resources.pipeline);
            pass.bind_descriptor_sets(&resources.pipeline, 0, &[ctx.scene_set, resources.input_set]);
            pass.draw_fullscreen();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::graph::ResourceState;

    #[test]
    fn test_inputs_are_sampled_and_reflection_written() {
        let pass = SsrPass::new();
        let frame = FrameInfo {
            shadows: false,
            skybox: None,
            ssr: true,
            anti_aliasing: true,
            clear_color: [0.0; 4],
        };
        let accesses = pass.accesses(&frame);

        assert_eq!(accesses.len(), 5);
        assert_eq!(accesses[3].state, ResourceState::DepthShaderRead);
        assert_eq!(
            accesses[4],
            ResourceAccess {
                resource: ResourceId::Reflection,
                state: ResourceState::ColorAttachment,
            }
        );
        assert!(pass.should_run(&frame));
        assert_eq!(pass.state(), PassState::Uninitialized);
    }
}
