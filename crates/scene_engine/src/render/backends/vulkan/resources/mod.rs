//! GPU memory resources: buffers, images, samplers and descriptors

pub mod buffer;
pub mod descriptor_set;
pub mod image;

pub use buffer::Buffer;
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use image::{subresource_range, Image, ImageDesc, Sampler};
