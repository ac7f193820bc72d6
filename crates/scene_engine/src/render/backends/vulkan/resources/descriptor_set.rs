//! Descriptor set layouts, pools and writes
//!
//! Layouts and pools are RAII wrappers. [`DescriptorSetWriter`] collects
//! buffer and image infos first and only builds the `VkWriteDescriptorSet`
//! array in [`DescriptorSetWriter::update`], so no pointer into a growing
//! vector is ever handed to Vulkan.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Descriptor set layout builder for creating reusable layouts
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    fn add(mut self, binding: u32, ty: vk::DescriptorType, count: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(count)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stage_flags)
    }

    /// Add a storage buffer binding
    pub fn add_storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::STORAGE_BUFFER, 1, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, stage_flags)
    }

    /// Add an array of `count` combined image samplers
    pub fn add_combined_image_sampler_array(self, binding: u32, count: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, count.max(1), stage_flags)
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

impl Default for DescriptorSetLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Pool sizes needed to allocate `sets` sets of this layout
    pub fn pool_sizes(&self, sets: u32) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for binding in &self.bindings {
            let count = binding.descriptor_count * sets;
            match sizes.iter_mut().find(|size| size.ty == binding.descriptor_type) {
                Some(size) => size.descriptor_count += count,
                None => sizes.push(vk::DescriptorPoolSize {
                    ty: binding.descriptor_type,
                    descriptor_count: count,
                }),
            }
        }
        sizes
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool sized for a fixed set of layouts
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Pool able to allocate `sets` sets of `layout`
    pub fn for_layout(device: &Device, layout: &DescriptorSetLayout, sets: u32) -> VulkanResult<Self> {
        let pool_sizes = layout.pool_sizes(sets);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate descriptor sets from this pool
    pub fn allocate_descriptor_sets(&self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer {
        set: vk::DescriptorSet,
        binding: u32,
        ty: vk::DescriptorType,
        info: usize,
    },
    Images {
        set: vk::DescriptorSet,
        binding: u32,
        first: usize,
        count: usize,
    },
}

/// Descriptor set writer for updating descriptor sets
#[derive(Default)]
pub struct DescriptorSetWriter {
    pending: Vec<PendingWrite>,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    image_infos: Vec<vk::DescriptorImageInfo>,
}

impl DescriptorSetWriter {
    /// Create a new descriptor set writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a whole buffer of type `ty`
    pub fn write_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        ty: vk::DescriptorType,
        buffer: vk::Buffer,
    ) -> Self {
        self.buffer_infos.push(
            vk::DescriptorBufferInfo::builder()
                .buffer(buffer)
                .offset(0)
                .range(vk::WHOLE_SIZE)
                .build(),
        );
        self.pending.push(PendingWrite::Buffer {
            set,
            binding,
            ty,
            info: self.buffer_infos.len() - 1,
        });
        self
    }

    /// Bind a single combined image sampler
    pub fn write_image(
        self,
        set: vk::DescriptorSet,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) -> Self {
        self.write_image_array(set, binding, std::iter::once(image_view), sampler, layout)
    }

    /// Bind consecutive array elements starting at element 0
    pub fn write_image_array(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        image_views: impl IntoIterator<Item = vk::ImageView>,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) -> Self {
        let first = self.image_infos.len();
        self.image_infos.extend(image_views.into_iter().map(|image_view| {
            vk::DescriptorImageInfo::builder()
                .image_view(image_view)
                .sampler(sampler)
                .image_layout(layout)
                .build()
        }));
        let count = self.image_infos.len() - first;
        if count > 0 {
            self.pending.push(PendingWrite::Images {
                set,
                binding,
                first,
                count,
            });
        }
        self
    }

    /// Execute all write operations
    pub fn update(self, device: &Device) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .pending
            .iter()
            .map(|pending| match *pending {
                PendingWrite::Buffer { set, binding, ty, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(ty)
                    .buffer_info(std::slice::from_ref(&self.buffer_infos[info]))
                    .build(),
                PendingWrite::Images {
                    set,
                    binding,
                    first,
                    count,
                } => vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&self.image_infos[first..first + count])
                    .build(),
            })
            .collect();

        if writes.is_empty() {
            return;
        }
        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}
