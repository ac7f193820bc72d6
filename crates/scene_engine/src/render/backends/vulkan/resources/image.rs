//! Images, views and samplers
//!
//! [`Image`] covers render targets, the shadow map and sampled textures
//! (2-D and cube). Texture uploads go through a staging buffer and a
//! one-time command buffer and leave the image in
//! `SHADER_READ_ONLY_OPTIMAL`.

use ash::{vk, Device};

use super::buffer::{find_memory_type, Buffer};
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::{GpuDevice, VulkanError, VulkanResult};
use crate::scene::{ImageData, TextureKind};

/// Creation parameters of an [`Image`]
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Size in pixels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Color or depth
    pub aspect: vk::ImageAspectFlags,
    /// Plain 2-D or cube
    pub kind: TextureKind,
}

impl ImageDesc {
    /// Sampled color attachment
    pub fn color_target(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::COLOR,
            kind: TextureKind::Texture2D,
        }
    }

    /// Sampled depth attachment
    pub fn depth_target(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::DEPTH,
            kind: TextureKind::Texture2D,
        }
    }

    /// RGBA8 texture filled by upload
    pub fn texture(width: u32, height: u32, kind: TextureKind) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::COLOR,
            kind,
        }
    }
}

/// Image with bound memory and a view over all layers
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    desc: ImageDesc,
}

impl Image {
    /// Allocate a device-local image
    pub fn new(gpu: &GpuDevice, desc: ImageDesc) -> VulkanResult<Self> {
        let device = gpu.device.clone();
        let layers = desc.kind.layer_count();
        let flags = match desc.kind {
            TextureKind::Cube => vk::ImageCreateFlags::CUBE_COMPATIBLE,
            TextureKind::Texture2D => vk::ImageCreateFlags::empty(),
        };

        let image_create_info = vk::ImageCreateInfo::builder()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width.max(1),
                height: desc.extent.height.max(1),
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(layers)
            .format(desc.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_create_info, None).map_err(VulkanError::Api)? };

        let memory_requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = find_memory_type(
            &gpu.instance,
            gpu.physical_device,
            memory_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let memory_allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(memory_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&memory_allocate_info, None) } {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::Api(error));
            }
        };

        let view_type = match desc.kind {
            TextureKind::Cube => vk::ImageViewType::CUBE,
            TextureKind::Texture2D => vk::ImageViewType::TYPE_2D,
        };
        let view_result = unsafe {
            device.bind_image_memory(image, memory, 0).and_then(|()| {
                let view_create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(view_type)
                    .format(desc.format)
                    .subresource_range(subresource_range(desc.aspect, layers));
                device.create_image_view(&view_create_info, None)
            })
        };
        let view = match view_result {
            Ok(view) => view,
            Err(error) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(VulkanError::Api(error));
            }
        };

        Ok(Self {
            device,
            image,
            memory,
            view,
            desc,
        })
    }

    /// Create a texture and upload `data` into it
    pub fn from_image_data(
        gpu: &GpuDevice,
        command_pool: &CommandPool,
        kind: TextureKind,
        data: &ImageData,
    ) -> VulkanResult<Self> {
        if !data.is_consistent() || data.layers != kind.layer_count() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "{}x{} image with {} layers does not fit a {:?} texture",
                    data.width, data.height, data.layers, kind
                ),
            });
        }

        let image = Self::new(gpu, ImageDesc::texture(data.width, data.height, kind))?;
        let staging = Buffer::staging(gpu, data.pixels.len() as vk::DeviceSize)?;
        staging.write(0, &data.pixels)?;

        let layers = kind.layer_count();
        let range = subresource_range(vk::ImageAspectFlags::COLOR, layers);
        command_pool.submit_once(gpu, |device, command_buffer| unsafe {
            let to_transfer = vk::ImageMemoryBarrier::builder()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image.image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer.build()],
            );

            // Layers are tightly packed one after another in the staging buffer
            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: layers,
                })
                .image_extent(vk::Extent3D {
                    width: data.width,
                    height: data.height,
                    depth: 1,
                });
            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging.handle(),
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );

            let to_shader = vk::ImageMemoryBarrier::builder()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image.image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader.build()],
            );
        })?;

        log::debug!("Uploaded {}x{} {:?} texture", data.width, data.height, kind);
        Ok(image)
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over every layer
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Size in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }

    /// Texel format
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    /// Color or depth aspect
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.desc.aspect
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Full range over `layers` layers of the single mip level
pub fn subresource_range(aspect_mask: vk::ImageAspectFlags, layers: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: layers,
    }
}

/// Sampler wrapper with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear filtering with the given addressing
    pub fn linear(gpu: &GpuDevice, address_mode: vk::SamplerAddressMode) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .min_lod(0.0)
            .max_lod(0.0);
        Self::from_info(gpu, &create_info)
    }

    /// Depth comparison sampler for shadow lookups (`sampler2DShadow`)
    pub fn shadow(gpu: &GpuDevice) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .compare_enable(true)
            .compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .max_lod(0.0);
        Self::from_info(gpu, &create_info)
    }

    fn from_info(gpu: &GpuDevice, create_info: &vk::SamplerCreateInfo) -> VulkanResult<Self> {
        let sampler = unsafe { gpu.device.create_sampler(create_info, None).map_err(VulkanError::Api)? };
        Ok(Self {
            device: gpu.device.clone(),
            sampler,
        })
    }

    /// Sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
