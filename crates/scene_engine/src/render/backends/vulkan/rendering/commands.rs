//! Command pools and recording helpers
//!
//! [`ActiveRenderPass`] ends its render pass when dropped, so a pass body
//! cannot leave the command buffer inside a render pass on an early return.

use ash::{vk, Device};
use bytemuck::Pod;

use super::render_pass::{Framebuffer, RenderPass};
use super::shader::GraphicsPipeline;
use crate::render::backends::vulkan::{GpuDevice, VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None).map_err(VulkanError::Api)? };

        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info).map_err(VulkanError::Api) }
    }

    /// Record with `record`, submit to the graphics queue and wait
    pub fn submit_once<F>(&self, gpu: &GpuDevice, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffers = self.allocate_command_buffers(1)?;
        let result = self.record_and_wait(gpu, command_buffers[0], record);
        unsafe {
            self.device.free_command_buffers(self.command_pool, &command_buffers);
        }
        result
    }

    fn record_and_wait<F>(&self, gpu: &GpuDevice, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        begin_one_time(&self.device, command_buffer)?;
        record(&self.device, command_buffer);
        unsafe {
            self.device.end_command_buffer(command_buffer).map_err(VulkanError::Api)?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            self.device
                .queue_submit(gpu.graphics_queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(gpu.graphics_queue).map_err(VulkanError::Api)
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Begin recording a buffer that is submitted once
pub fn begin_one_time(device: &Device, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe {
        device
            .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
            .map_err(VulkanError::Api)?;
        device.begin_command_buffer(command_buffer, &begin_info).map_err(VulkanError::Api)
    }
}

/// Recording scope of one render pass instance
pub struct ActiveRenderPass<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
    extent: vk::Extent2D,
}

impl<'a> ActiveRenderPass<'a> {
    /// Begin `render_pass` on `framebuffer` and cover it with the viewport
    pub fn begin(
        device: &'a Device,
        command_buffer: vk::CommandBuffer,
        render_pass: &RenderPass,
        framebuffer: &Framebuffer,
        clear_values: &[vk::ClearValue],
    ) -> Self {
        let extent = framebuffer.extent();
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        let mut active = Self {
            device,
            command_buffer,
            extent,
        };
        active.set_full_viewport();
        active
    }

    /// Viewport and scissor over the whole framebuffer
    pub fn set_full_viewport(&mut self) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }

    /// Bind a graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
        }
    }

    /// Bind descriptor sets starting at `first_set`
    pub fn bind_descriptor_sets(&mut self, pipeline: &GraphicsPipeline, first_set: u32, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout(),
                first_set,
                sets,
                &[],
            );
        }
    }

    /// Push constants to vertex and fragment stages
    pub fn push_constants<T: Pod>(&mut self, pipeline: &GraphicsPipeline, data: &T) {
        unsafe {
            self.device.cmd_push_constants(
                self.command_buffer,
                pipeline.layout(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(data),
            );
        }
    }

    /// Set the dynamic depth bias
    pub fn set_depth_bias(&mut self, constant_factor: f32, slope_factor: f32) {
        unsafe {
            self.device
                .cmd_set_depth_bias(self.command_buffer, constant_factor, 0.0, slope_factor);
        }
    }

    /// Bind vertex and index buffers
    pub fn bind_geometry(&mut self, vertex_buffer: vk::Buffer, index_buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[vertex_buffer], &[0]);
            self.device
                .cmd_bind_index_buffer(self.command_buffer, index_buffer, 0, vk::IndexType::UINT32);
        }
    }

    /// Draw indexed
    pub fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
    }

    /// Draw a fullscreen triangle generated in the vertex shader
    pub fn draw_fullscreen(&mut self) {
        unsafe {
            self.device.cmd_draw(self.command_buffer, 3, 1, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
    }
}
