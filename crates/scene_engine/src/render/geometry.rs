//! Device-local vertex and index buffers
//!
//! The template pool (unit cube and plane) is uploaded once. The scene pool
//! is re-uploaded whenever the scene's geometry revision changes, after a
//! device-idle wait.

use ash::vk;
use bytemuck::Pod;

use crate::ecs::components::GeometrySource;
use crate::render::backends::vulkan::{ActiveRenderPass, Buffer, CommandPool, GpuDevice, VulkanResult};
use crate::render::error::RenderResult;
use crate::render::primitives::mesh::GeometryPool;
use crate::scene::Scene;

/// Vertex and index buffer of one pool
struct PoolBuffers {
    vertices: Buffer,
    indices: Buffer,
}

impl PoolBuffers {
    fn upload(gpu: &GpuDevice, command_pool: &CommandPool, pool: &GeometryPool) -> VulkanResult<Option<Self>> {
        if pool.is_empty() {
            return Ok(None);
        }
        let vertices = upload_buffer(gpu, command_pool, pool.vertices(), vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let indices = upload_buffer(gpu, command_pool, pool.indices(), vk::BufferUsageFlags::INDEX_BUFFER)?;
        Ok(Some(Self { vertices, indices }))
    }
}

/// GPU copies of the template and scene geometry pools
pub struct GeometryBuffers {
    gpu: GpuDevice,
    templates: Option<PoolBuffers>,
    scene: Option<PoolBuffers>,
    scene_revision: Option<u64>,
}

impl GeometryBuffers {
    /// Upload the template pool
    pub fn new(gpu: &GpuDevice, command_pool: &CommandPool) -> RenderResult<Self> {
        let templates = PoolBuffers::upload(gpu, command_pool, &GeometryPool::templates())?;
        Ok(Self {
            gpu: gpu.clone(),
            templates,
            scene: None,
            scene_revision: None,
        })
    }

    /// Re-upload the scene pool if its revision changed
    pub fn update(&mut self, command_pool: &CommandPool, scene: &Scene) -> RenderResult<()> {
        if self.scene_revision == Some(scene.geometry_revision()) {
            return Ok(());
        }

        // Frames in flight may still read the old buffers
        self.gpu.wait_idle()?;
        self.scene = None;
        self.scene = PoolBuffers::upload(&self.gpu, command_pool, scene.geometry())?;
        self.scene_revision = Some(scene.geometry_revision());

        log::debug!(
            "Uploaded scene geometry: {} vertices, {} indices (revision {})",
            scene.geometry().vertices().len(),
            scene.geometry().indices().len(),
            scene.geometry_revision()
        );
        Ok(())
    }

    /// Bind the buffers of `source`; false when that pool is empty
    pub fn bind(&self, pass: &mut ActiveRenderPass<'_>, source: GeometrySource) -> bool {
        let buffers = match source {
            GeometrySource::Template => self.templates.as_ref(),
            GeometrySource::Scene => self.scene.as_ref(),
        };
        match buffers {
            Some(buffers) => {
                pass.bind_geometry(buffers.vertices.handle(), buffers.indices.handle());
                true
            }
            None => false,
        }
    }
}

/// Copy `data` into a new device-local buffer through a staging buffer
fn upload_buffer<T: Pod>(
    gpu: &GpuDevice,
    command_pool: &CommandPool,
    data: &[T],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<Buffer> {
    let size = std::mem::size_of_val(data) as vk::DeviceSize;
    let staging = Buffer::staging(gpu, size)?;
    staging.write(0, data)?;

    let buffer = Buffer::device_local(gpu, size, usage)?;
    command_pool.submit_once(gpu, |device, command_buffer| unsafe {
        device.cmd_copy_buffer(
            command_buffer,
            staging.handle(),
            buffer.handle(),
            &[vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            }],
        );
    })?;
    Ok(buffer)
}
