//! Buffer management for geometry, uniforms and staging
//!
//! Device-local buffers are filled through host-visible staging buffers.

use ash::{vk, Device, Instance};
use bytemuck::Pod;

use crate::render::backends::vulkan::{GpuDevice, VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        gpu: &GpuDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = gpu.device.clone();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size.max(4))
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = find_memory_type(
            &gpu.instance,
            gpu.physical_device,
            mem_requirements.memory_type_bits,
            properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(error));
            }
        };

        unsafe {
            device.bind_buffer_memory(buffer, memory, 0).map_err(VulkanError::Api)?;
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Host-visible, coherent buffer used as a copy source
    pub fn staging(gpu: &GpuDevice, size: vk::DeviceSize) -> VulkanResult<Self> {
        Self::new(
            gpu,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Device-local buffer that can be a copy and fill destination
    pub fn device_local(gpu: &GpuDevice, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        Self::new(
            gpu,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    /// Write `data` at byte `offset`; the buffer must be host visible
    pub fn write<T: Pod>(&self, offset: vk::DeviceSize, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes at {} overflows buffer of {}", bytes.len(), offset, self.size),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, offset, bytes.len() as vk::DeviceSize, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Find memory type with required properties
pub fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let mem_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

    (0..mem_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && mem_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}
