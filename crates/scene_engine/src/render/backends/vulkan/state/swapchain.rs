//! Vulkan swapchain management
//!
//! Creation and recreation share one path; recreation passes the retired
//! handle as `old_swapchain`.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};

use crate::render::backends::vulkan::resources::image::subresource_range;
use crate::render::backends::vulkan::{PhysicalDeviceInfo, VulkanError, VulkanResult};

/// Result of acquiring the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// Image index ready for rendering; `suboptimal` asks for recreation later
    Ready { index: u32, suboptimal: bool },
    /// The surface changed and the swapchain must be recreated first
    OutOfDate,
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain, retiring `old_swapchain` when it is not null
    pub fn new(
        instance: &Instance,
        device: Device,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device_info: &PhysicalDeviceInfo,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device_info.device, surface)
                .map_err(VulkanError::Api)?
        };

        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device_info.device, surface)
                .map_err(VulkanError::Api)?
        };
        let format = surface_formats
            .iter()
            .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .or_else(|| surface_formats.first())
            .copied()
            .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))?;

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device_info.device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_mode = present_modes
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO);

        let extent = choose_extent(&surface_caps, window_extent);

        let image_count = if surface_caps.max_image_count > 0 {
            (surface_caps.min_image_count + 1).min(surface_caps.max_image_count)
        } else {
            surface_caps.min_image_count + 1
        };

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain).map_err(VulkanError::Api)? };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR, 1));
            match unsafe { device.create_image_view(&create_info, None) } {
                Ok(view) => image_views.push(view),
                Err(error) => {
                    unsafe {
                        for view in image_views {
                            device.destroy_image_view(view, None);
                        }
                        swapchain_loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(VulkanError::Api(error));
                }
            }
        }

        log::debug!(
            "Swapchain created: {} images, {:?}, {:?}, {}x{}",
            images.len(),
            format.format,
            present_mode,
            extent.width,
            extent.height
        );

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Acquire the next image, signalling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<AcquiredImage> {
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquiredImage::Ready { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
            Err(error) => Err(VulkanError::Api(error)),
        }
    }

    /// Queue image `index` for presentation; returns true when the
    /// swapchain should be recreated
    pub fn present(&self, queue: vk::Queue, index: u32, wait_semaphore: vk::Semaphore) -> VulkanResult<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(error) => Err(VulkanError::Api(error)),
        }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get the presentable images
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window_extent
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_extent_follows_surface_when_fixed() {
        let fixed = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = choose_extent(&caps(fixed), vk::Extent2D { width: 1, height: 1 });
        assert_eq!(extent, fixed);
    }

    #[test]
    fn test_extent_clamps_window_size() {
        let free = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let extent = choose_extent(
            &caps(free),
            vk::Extent2D {
                width: 10_000,
                height: 0,
            },
        );
        assert_eq!(extent, vk::Extent2D { width: 4096, height: 1 });
    }
}
