//! Render passes and framebuffers
//!
//! Attachments start and end in their attachment-optimal layout. Layout
//! changes between passes are recorded as explicit barriers by the
//! resource tracker, so render passes carry no external dependencies.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// One attachment of a single-subpass render pass
#[derive(Debug, Clone, Copy)]
pub struct AttachmentSpec {
    /// Image format
    pub format: vk::Format,
    /// Clear or keep the previous contents
    pub load_op: vk::AttachmentLoadOp,
    /// Depth attachment instead of color
    pub depth: bool,
}

impl AttachmentSpec {
    /// Color attachment
    pub const fn color(format: vk::Format, load_op: vk::AttachmentLoadOp) -> Self {
        Self {
            format,
            load_op,
            depth: false,
        }
    }

    /// Depth attachment
    pub const fn depth(format: vk::Format, load_op: vk::AttachmentLoadOp) -> Self {
        Self {
            format,
            load_op,
            depth: true,
        }
    }

    fn layout(&self) -> vk::ImageLayout {
        if self.depth {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        } else {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        }
    }
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Single subpass writing every attachment; at most one depth attachment
    pub fn new(device: &Device, attachments: &[AttachmentSpec]) -> VulkanResult<Self> {
        let descriptions: Vec<vk::AttachmentDescription> = attachments
            .iter()
            .map(|spec| {
                let initial_layout = if spec.load_op == vk::AttachmentLoadOp::LOAD {
                    spec.layout()
                } else {
                    vk::ImageLayout::UNDEFINED
                };
                vk::AttachmentDescription::builder()
                    .format(spec.format)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(spec.load_op)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(initial_layout)
                    .final_layout(spec.layout())
                    .build()
            })
            .collect();

        let color_refs: Vec<vk::AttachmentReference> = attachments
            .iter()
            .enumerate()
            .filter(|(_, spec)| !spec.depth)
            .map(|(index, spec)| vk::AttachmentReference {
                attachment: index as u32,
                layout: spec.layout(),
            })
            .collect();
        let depth_ref = attachments
            .iter()
            .position(|spec| spec.depth)
            .map(|index| vk::AttachmentReference {
                attachment: index as u32,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            });

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass.build()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&descriptions)
            .subpasses(&subpasses);

        let render_pass = unsafe { device.create_render_pass(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self {
            device: device.clone(),
            render_pass,
        })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: &Device,
        render_pass: &RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self {
            device: device.clone(),
            framebuffer,
            extent,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Size of the attachments
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
