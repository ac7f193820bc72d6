//! Images shared between passes

use ash::vk;

use crate::render::backends::vulkan::{GpuDevice, Image, ImageDesc, Sampler, VulkanResult};
use crate::render::graph::ResourceId;

/// Lit color, normals and reflections
pub const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
/// Metallic, roughness and ior
pub const SPECULAR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
/// Scene depth and shadow map
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Window-sized working images
struct SizedTargets {
    base_color: Image,
    normal: Image,
    specular: Image,
    depth: Image,
    reflection: Image,
}

impl SizedTargets {
    fn new(gpu: &GpuDevice, extent: vk::Extent2D) -> VulkanResult<Self> {
        Ok(Self {
            base_color: Image::new(gpu, ImageDesc::color_target(extent, HDR_FORMAT))?,
            normal: Image::new(gpu, ImageDesc::color_target(extent, HDR_FORMAT))?,
            specular: Image::new(gpu, ImageDesc::color_target(extent, SPECULAR_FORMAT))?,
            depth: Image::new(gpu, ImageDesc::depth_target(extent, DEPTH_FORMAT))?,
            reflection: Image::new(gpu, ImageDesc::color_target(extent, HDR_FORMAT))?,
        })
    }
}

/// Render targets plus the samplers used to read them
///
/// The window-sized images are recreated by [`RenderTargets::resize`]; the
/// shadow map keeps its configured resolution.
pub struct RenderTargets {
    gpu: GpuDevice,
    extent: vk::Extent2D,
    sized: SizedTargets,
    shadow_map: Image,
    linear_sampler: Sampler,
    shadow_sampler: Sampler,
}

impl RenderTargets {
    /// Create every target
    pub fn new(gpu: &GpuDevice, extent: vk::Extent2D, shadow_resolution: u32) -> VulkanResult<Self> {
        let shadow_extent = vk::Extent2D {
            width: shadow_resolution,
            height: shadow_resolution,
        };
        Ok(Self {
            gpu: gpu.clone(),
            extent,
            sized: SizedTargets::new(gpu, extent)?,
            shadow_map: Image::new(gpu, ImageDesc::depth_target(shadow_extent, DEPTH_FORMAT))?,
            linear_sampler: Sampler::linear(gpu, vk::SamplerAddressMode::CLAMP_TO_EDGE)?,
            shadow_sampler: Sampler::shadow(gpu)?,
        })
    }

    /// Recreate the window-sized images; the device must be idle
    pub fn resize(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.sized = SizedTargets::new(&self.gpu, extent)?;
        self.extent = extent;
        log::debug!("Render targets resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Size of the window-sized images
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Shadow map size
    pub fn shadow_extent(&self) -> vk::Extent2D {
        self.shadow_map.extent()
    }

    /// Image backing `resource`; `None` for the presentable output
    pub fn image(&self, resource: ResourceId) -> Option<&Image> {
        match resource {
            ResourceId::ShadowMap => Some(&self.shadow_map),
            ResourceId::BaseColor => Some(&self.sized.base_color),
            ResourceId::Normal => Some(&self.sized.normal),
            ResourceId::Specular => Some(&self.sized.specular),
            ResourceId::Depth => Some(&self.sized.depth),
            ResourceId::Reflection => Some(&self.sized.reflection),
            ResourceId::Output => None,
        }
    }

    /// View of a target image
    pub fn view(&self, resource: ResourceId) -> vk::ImageView {
        self.image(resource).map_or(vk::ImageView::null(), Image::view)
    }

    /// Clamped linear sampler for screen-space reads
    pub fn linear_sampler(&self) -> vk::Sampler {
        self.linear_sampler.handle()
    }

    /// Depth-compare sampler for the shadow map
    pub fn shadow_sampler(&self) -> vk::Sampler {
        self.shadow_sampler.handle()
    }
}
