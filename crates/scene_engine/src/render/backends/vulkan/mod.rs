//! Vulkan backend
//!
//! Thin RAII wrappers over `ash`. Every wrapper keeps a clone of the logical
//! device and destroys its handle in `Drop`; owners must drop them before
//! the [`VulkanContext`].

/// Instance, device and window setup
pub mod initialization;

/// Buffers, images and descriptors
pub mod resources;

/// Shaders, pipelines, render passes and command recording
pub mod rendering;

/// Swapchain, synchronization and timing
pub mod state;

pub use initialization::context::{GpuDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanResult};
pub use initialization::window::{Window, WindowError, WindowResult};

pub use resources::{
    Buffer, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter, Image, ImageDesc,
    Sampler,
};

pub use rendering::{
    begin_one_time, ActiveRenderPass, AttachmentSpec, CommandPool, Framebuffer, GraphicsPipeline,
    GraphicsPipelineBuilder, RenderPass, ShaderModule,
};

pub use state::{AcquiredImage, Fence, FrameSync, Semaphore, Swapchain, TimestampQueries};
