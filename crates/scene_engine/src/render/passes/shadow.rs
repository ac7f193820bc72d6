//! Directional shadow map

use ash::vk;

use crate::ecs::components::{DirectionalLight, ShadowCullMode};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Point3, Vec3};
use crate::render::backends::vulkan::{
    ActiveRenderPass, AttachmentSpec, Framebuffer, GraphicsPipeline, GraphicsPipelineBuilder, RenderPass,
};
use crate::render::error::RenderResult;
use crate::render::graph::{ResourceAccess, ResourceId};
use crate::scene::Aabb;

use super::targets::DEPTH_FORMAT;
use super::{draw_meshes, DrawConstants, FrameInfo, Lifecycle, PassContext, PassInit, PassSlot, PassState, RenderPassNode};

/// Rasterizer bias applied on top of the light's shader-side bias
const DEPTH_BIAS_CONSTANT: f32 = 1.25;
const DEPTH_BIAS_SLOPE: f32 = 1.75;

/// Orthographic light matrix (`P * X * V`) whose volume encloses `bounds`
///
/// The light looks along `-direction_to_light` at the box center; the
/// projection is fitted to the box corners in light view space.
pub fn light_view_projection(light: &DirectionalLight, bounds: &Aabb) -> Mat4 {
    let direction = light.direction_to_light();
    let radius = bounds.extents.norm().max(1e-3);
    let eye = bounds.center + direction * (radius * 2.0);
    let forward = -direction;
    let view = Mat4::vulkan_coordinate_transform() * Mat4::look_at(eye, bounds.center, utils::stable_up(&forward));

    let mut min = Vec3::repeat(f32::MAX);
    let mut max = Vec3::repeat(f32::MIN);
    for corner in bounds.corners() {
        let p = view.transform_point(&Point3::from(corner)).coords;
        min = min.inf(&p);
        max = max.sup(&p);
    }

    // Keep flat boxes from collapsing a range
    let max = max.sup(&(min + Vec3::repeat(1e-3)));
    let pad = (radius * 0.01).max(1e-3);
    let projection = Mat4::orthographic(min.x, max.x, min.y, max.y, min.z - pad, max.z + pad);
    projection * view
}

struct ShadowResources {
    render_pass: RenderPass,
    framebuffer: Framebuffer,
    cull_back: GraphicsPipeline,
    cull_front: GraphicsPipeline,
}

/// Depth-only render of every mesh from the directional light
#[derive(Default)]
pub struct ShadowPass {
    lifecycle: Lifecycle<ShadowResources>,
}

impl ShadowPass {
    /// Uninitialized pass
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderPassNode for ShadowPass {
    fn slot(&self) -> PassSlot {
        PassSlot::Shadow
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, init: &PassInit<'_>) -> RenderResult<()> {
        let device = &init.gpu.device;
        let render_pass = RenderPass::new(
            device,
            &[AttachmentSpec::depth(DEPTH_FORMAT, vk::AttachmentLoadOp::CLEAR)],
        )?;
        let framebuffer = Framebuffer::new(
            device,
            &render_pass,
            &[init.targets.view(ResourceId::ShadowMap)],
            init.targets.shadow_extent(),
        )?;

        let vertex = init.shader("shadow.vert.spv")?;
        let pipeline = |cull_mode| {
            GraphicsPipelineBuilder::new(&vertex)
                .cull_mode(cull_mode)
                .depth(true, true)
                .dynamic_depth_bias()
                .color_attachments(0)
                .push_constants(DrawConstants::SIZE)
                .set_layouts(&[init.scene_layout])
                .specialization(&init.texture_array_sizes())
                .build(device, render_pass.handle())
        };
        let cull_back = pipeline(vk::CullModeFlags::BACK)?;
        let cull_front = pipeline(vk::CullModeFlags::FRONT)?;

        self.lifecycle.set(ShadowResources {
            render_pass,
            framebuffer,
            cull_back,
            cull_front,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.lifecycle.release();
    }

    fn resize(&mut self, _init: &PassInit<'_>) -> RenderResult<()> {
        // The shadow map does not follow the window size
        Ok(())
    }

    fn should_run(&self, frame: &FrameInfo) -> bool {
        frame.shadows
    }

    fn accesses(&self, _frame: &FrameInfo) -> Vec<ResourceAccess> {
        vec![ResourceAccess::write(ResourceId::ShadowMap)]
    }

    fn record(&mut self, ctx: &PassContext<'_>) -> RenderResult<()> {
        let cull_mode = ctx
            .scene
            .directional_light()
            .map(|(_, light)| light.shadow.cull_mode)
            .unwrap_or_default();

        self.lifecycle.render(PassSlot::Shadow, |resources| {
            let clear = [vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            }];
            let mut pass = ActiveRenderPass::begin(
                ctx.device,
                ctx.command_buffer,
                &resources.render_pass,
                &resources.framebuffer,
                &clear,
            );

            let pipeline = match cull_mode {
                ShadowCullMode::Back => &resources.cull_back,
                ShadowCullMode::Front => &resources.cull_front,
            };
            pass.bind_pipeline(pipeline);
            pass.bind_descriptor_sets(pipeline, 0, &[ctx.scene_set]);
            pass.set_depth_bias(DEPTH_BIAS_CONSTANT, DEPTH_BIAS_SLOPE);
            let draws = draw_meshes(&mut pass, pipeline, ctx, ctx.shadow_casters);
            log::trace!("Shadow pass: {} draws", draws);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;

    fn assert_inside_clip_volume(matrix: &Mat4, bounds: &Aabb) {
        for corner in bounds.corners() {
            let clip = matrix * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            let ndc = clip.xyz() / clip.w;
            assert!(ndc.x.abs() <= 1.0 + 1e-4, "x out of range: {}", ndc.x);
            assert!(ndc.y.abs() <= 1.0 + 1e-4, "y out of range: {}", ndc.y);
            assert!(ndc.z >= -1e-4 && ndc.z <= 1.0 + 1e-4, "z out of range: {}", ndc.z);
        }
    }

    #[test]
    fn test_fit_encloses_scene_bounds() {
        let bounds = Aabb::from_min_max(Vec3::new(-4.0, 0.0, -2.0), Vec3::new(6.0, 3.0, 8.0));
        for (phi, theta) in [(0.0, 0.3), (1.2, 0.9), (-2.5, 1.4), (0.7, 0.0)] {
            let light = DirectionalLight {
                phi,
                theta,
                ..Default::default()
            };
            assert_inside_clip_volume(&light_view_projection(&light, &bounds), &bounds);
        }
    }

    #[test]
    fn test_fit_handles_flat_bounds() {
        let bounds = Aabb::from_min_max(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 0.0, 5.0));
        let light = DirectionalLight::default();
        let matrix = light_view_projection(&light, &bounds);
        assert!(matrix.iter().all(|value| value.is_finite()));
        assert_inside_clip_volume(&matrix, &bounds);
    }

    #[test]
    fn test_light_side_is_nearer() {
        let bounds = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let light = DirectionalLight {
            phi: 0.0,
            theta: 0.0,
            ..Default::default()
        };
        let matrix = light_view_projection(&light, &bounds);
        let top = matrix * Vec4::new(0.0, 1.0, 0.0, 1.0);
        let bottom = matrix * Vec4::new(0.0, -1.0, 0.0, 1.0);
        assert!(top.z < bottom.z);
    }
}
