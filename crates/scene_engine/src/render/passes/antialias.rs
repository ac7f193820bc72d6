//! Final resolve into the presentable image
//!
//! Composites the reflections over the lit color, tone maps, and applies
//! FXAA when enabled. One framebuffer per presentable image.

use ash::vk;

use crate::render::backends::vulkan::{
    ActiveRenderPass, AttachmentSpec, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorSetWriter, Framebuffer, GraphicsPipeline, GraphicsPipelineBuilder, RenderPass,
};
use crate::render::error::RenderResult;
use crate::render::graph::{ResourceAccess, ResourceId};

use super::{FrameInfo, Lifecycle, PassContext, PassInit, PassSlot, PassState, RenderPassNode};

/// Push constant block of the resolve shader
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ResolveConstants {
    /// `1 / width`, `1 / height` of the working images
    pub texel_size: [f32; 2],
    /// 1 when the reflection image holds this frame's SSR output
    pub reflections: f32,
    /// 1 to run FXAA
    pub fxaa: f32,
}

impl ResolveConstants {
    /// Size in bytes
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Constants for a frame of `extent`
    pub fn new(extent: vk::Extent2D, frame: &FrameInfo) -> Self {
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        Self {
            texel_size: [1.0 / extent.width.max(1) as f32, 1.0 / extent.height.max(1) as f32],
            reflections: flag(frame.ssr),
            fxaa: flag(frame.anti_aliasing),
        }
    }
}

struct AntiAliasResources {
    render_pass: RenderPass,
    framebuffers: Vec<Framebuffer>,
    pipeline: GraphicsPipeline,
    input_set: vk::DescriptorSet,
    extent: vk::Extent2D,
    _input_pool: DescriptorPool,
    _input_layout: DescriptorSetLayout,
}

/// Writes the frame into the swapchain image
#[derive(Default)]
pub struct AntiAliasPass {
    lifecycle: Lifecycle<AntiAliasResources>,
}

impl AntiAliasPass {
    /// Uninitialized pass
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderPassNode for AntiAliasPass {
    fn slot(&self) -> PassSlot {
        PassSlot::AntiAlias
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, init: &PassInit<'_>) -> RenderResult<()> {
        let device = &init.gpu.device;
        let extent = init.targets.extent();
        let render_pass = RenderPass::new(
            device,
            &[AttachmentSpec::color(init.output_format, vk::AttachmentLoadOp::CLEAR)],
        )?;
        let framebuffers = init
            .output_views
            .iter()
            .map(|&view| Framebuffer::new(device, &render_pass, &[view], extent))
            .collect::<Result<Vec<_>, _>>()?;

        let input_layout = DescriptorSetLayoutBuilder::new()
            .add_combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
            .build(device)?;
        let input_pool = DescriptorPool::for_layout(device, &input_layout, 1)?;
        let input_set = input_pool.allocate_descriptor_sets(&[input_layout.handle()])?[0];
        DescriptorSetWriter::new()
            .write_image(
                input_set,
                0,
                init.targets.view(ResourceId::BaseColor),
                init.targets.linear_sampler(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
            .write_image(
                input_set,
                1,
                init.targets.view(ResourceId::Reflection),
                init.targets.linear_sampler(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
            .update(device);

        let vertex = init.shader("fullscreen.vert.spv")?;
        let fragment = init.shader("antialias.frag.spv")?;
        let pipeline = GraphicsPipelineBuilder::new(&vertex)
            .fragment(&fragment)
            .without_vertex_input()
            .cull_mode(vk::CullModeFlags::NONE)
            .depth(false, false)
            .push_constants(ResolveConstants::SIZE)
            .set_layouts(&[input_layout.handle()])
            .build(device, render_pass.handle())?;

        self.lifecycle.set(AntiAliasResources {
            render_pass,
            framebuffers,
            pipeline,
            input_set,
            extent,
            _input_pool: input_pool,
            _input_layout: input_layout,
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
        // Reflection is always bound, so it must be readable even when SSR
        // did not run
        vec![
            ResourceAccess::read(ResourceId::BaseColor),
            ResourceAccess::read(ResourceId::Reflection),
            ResourceAccess::write(ResourceId::Output),
        ]
    }

    fn record(&mut self, ctx: &PassContext<'_>) -> RenderResult<()> {
        self.lifecycle.render(PassSlot::AntiAlias, |resources| {
            let Some(framebuffer) = resources.framebuffers.get(ctx.image_index) else {
                log::warn!("No framebuffer for presentable image {}", ctx.image_index);
                return Ok(());
            };
            let clear = [vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0; 4] },
            }];
            let mut pass =
                ActiveRenderPass::begin(ctx.device, ctx.command_buffer, &resources.render_pass, framebuffer, &clear);
            pass.bind_pipeline(&resources.pipeline);
            pass.bind_descriptor_sets(&resources.pipeline, 0, &[resources.input_set]);
            pass.push_constants(&resources.pipeline, &ResolveConstants::new(resources.extent, &ctx.frame));
            pass.draw_fullscreen();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resolve_constants() {
        let frame = FrameInfo {
            shadows: true,
            skybox: None,
            ssr: false,
            anti_aliasing: true,
            clear_color: [0.0; 4],
        };
        let constants = ResolveConstants::new(vk::Extent2D { width: 800, height: 400 }, &frame);

        assert_relative_eq!(constants.texel_size[0], 1.0 / 800.0);
        assert_relative_eq!(constants.texel_size[1], 1.0 / 400.0);
        assert_relative_eq!(constants.reflections, 0.0);
        assert_relative_eq!(constants.fxaa, 1.0);
        assert_eq!(ResolveConstants::SIZE, 16);
    }

    #[test]
    fn test_reflection_is_always_readable() {
        let pass = AntiAliasPass::new();
        let frame = FrameInfo {
            shadows: false,
            skybox: None,
            ssr: false,
            anti_aliasing: false,
            clear_color: [0.0; 4],
        };
        assert!(pass
            .accesses(&frame)
            .contains(&ResourceAccess::read(ResourceId::Reflection)));
    }
}
