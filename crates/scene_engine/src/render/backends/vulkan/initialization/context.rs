//! Vulkan context management
//!
//! Instance, surface, physical device selection, logical device and the
//! swapchain. Objects are wrapped in RAII types and dropped in reverse
//! creation order.

use std::ffi::{CStr, CString};
use std::path::PathBuf;

#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use thiserror::Error;

use super::window::Window;
use crate::render::backends::vulkan::state::swapchain::Swapchain;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// A SPIR-V file could not be read
    #[error("failed to load shader {path}: {source}")]
    ShaderLoad {
        /// Shader file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Debug utilities extension (debug builds)
    #[cfg(debug_assertions)]
    pub debug_utils: Option<DebugUtils>,
    /// Debug messenger handle (debug builds)
    #[cfg(debug_assertions)]
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a Vulkan instance; validation layers are only requested in
    /// debug builds and when `enable_validation` is set.
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        let app_name_cstr = c_string(app_name)?;
        let engine_name_cstr = c_string("scene_engine")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;
        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| c_string(ext))
            .collect::<VulkanResult<Vec<_>>>()?;

        #[allow(unused_mut)]
        let mut extensions: Vec<*const i8> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation = cfg!(debug_assertions) && enable_validation;
        #[cfg(debug_assertions)]
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if validation {
            vec![c_string("VK_LAYER_KHRONOS_validation")?]
        } else {
            Vec::new()
        };
        let layer_names_ptrs: Vec<*const i8> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let debug_messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(debug_messenger))
        } else {
            (None, None)
        };

        log::debug!("Created Vulkan instance (validation: {})", validation);

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(debug_messenger)) = (&self.debug_utils, &self.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(*debug_messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

fn c_string(value: &str) -> VulkanResult<CString> {
    CString::new(value).map_err(|_| VulkanError::InitializationFailed(format!("'{}' contains a nul byte", value)))
}

/// Log level of a validation message
#[cfg(debug_assertions)]
fn message_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    type Severity = vk::DebugUtilsMessageSeverityFlagsEXT;
    if severity.contains(Severity::ERROR) {
        log::Level::Error
    } else if severity.contains(Severity::WARNING) {
        log::Level::Warn
    } else if severity.contains(Severity::INFO) {
        log::Level::Debug
    } else {
        log::Level::Trace
    }
}

/// Forwards validation messages into `log`
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    log::log!(target: "vulkan", message_level(message_severity), "{:?}: {}", message_type, message);
    vk::FALSE
}

/// Queue families a device renders and presents with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueFamilies {
    graphics: u32,
    present: u32,
}

impl QueueFamilies {
    /// Prefer one family doing both; otherwise the first of each
    fn find(
        families: &[vk::QueueFamilyProperties],
        supports_present: impl Fn(u32) -> VulkanResult<bool>,
    ) -> VulkanResult<Option<Self>> {
        let mut graphics = None;
        let mut present = None;
        for (index, family) in (0u32..).zip(families) {
            let can_draw = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let can_present = supports_present(index)?;
            if can_draw && can_present {
                return Ok(Some(Self { graphics: index, present: index }));
            }
            if can_draw {
                graphics.get_or_insert(index);
            }
            if can_present {
                present.get_or_insert(index);
            }
        }
        Ok(graphics.zip(present).map(|(graphics, present)| Self { graphics, present }))
    }
}

/// Preference order when several GPUs qualify
fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Graphics queue supports timestamp queries
    pub timestamps: bool,
}

impl PhysicalDeviceInfo {
    /// Pick the best ranked device that can render and present to `surface`
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };

        let mut best: Option<Self> = None;
        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(candidate) => {
                    let rank = device_type_rank(candidate.properties.device_type);
                    if best
                        .as_ref()
                        .map_or(true, |current| rank > device_type_rank(current.properties.device_type))
                    {
                        best = Some(candidate);
                    }
                }
                Err(error) => log::debug!("Skipping GPU: {}", error),
            }
        }

        let selected = best.ok_or_else(|| VulkanError::InitializationFailed("No suitable GPU found".to_string()))?;
        log::info!(
            "Selected GPU: {} ({:?}, timestamps {})",
            selected.name(),
            selected.properties.device_type,
            if selected.timestamps { "on" } else { "off" }
        );
        Ok(selected)
    }

    /// Device name reported by the driver
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queues = QueueFamilies::find(&families, |index| unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .map_err(VulkanError::Api)
        })?
        .ok_or_else(|| VulkanError::InitializationFailed("No graphics and present queues".to_string()))?;

        // Texture arrays are indexed with per-object values in the fragment shader
        if features.shader_sampled_image_array_dynamic_indexing == vk::FALSE {
            return Err(VulkanError::InitializationFailed(
                "Dynamic indexing of sampled image arrays not supported".to_string(),
            ));
        }

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        if !extensions
            .iter()
            .any(|available| unsafe { CStr::from_ptr(available.extension_name.as_ptr()) } == SwapchainLoader::name())
        {
            return Err(VulkanError::InitializationFailed("VK_KHR_swapchain not supported".to_string()));
        }

        let timestamps = properties.limits.timestamp_compute_and_graphics == vk::TRUE
            && families[queues.graphics as usize].timestamp_valid_bits > 0;

        Ok(Self {
            device,
            properties,
            graphics_family: queues.graphics,
            present_family: queues.present,
            timestamps,
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create a logical device with graphics and present queues
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let graphics = physical_device_info.graphics_family;
        let present = physical_device_info.present_family;
        let mut families = vec![graphics];
        if present != graphics {
            families.push(present);
        }

        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .shader_sampled_image_array_dynamic_indexing(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device_info.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Cheap handle bundle handed to every GPU resource owner
///
/// Holds clones of the loaded function tables; the [`VulkanContext`] that
/// created it must outlive every object built through it.
#[derive(Clone)]
pub struct GpuDevice {
    /// Logical device
    pub device: Device,
    /// Instance, needed for memory property queries
    pub instance: Instance,
    /// Physical device
    pub physical_device: vk::PhysicalDevice,
    /// Graphics queue
    pub graphics_queue: vk::Queue,
    /// Present queue
    pub present_queue: vk::Queue,
    /// Graphics queue family index
    pub graphics_family: u32,
    /// Nanoseconds per timestamp tick, `None` when timestamps are unsupported
    pub timestamp_period: Option<f32>,
}

impl GpuDevice {
    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

/// Main Vulkan context that owns all core Vulkan resources
pub struct VulkanContext {
    /// Vulkan surface for rendering
    surface: vk::SurfaceKHR,
    /// Surface extension loader
    surface_loader: Surface,
    /// Selected physical device information
    physical_device: PhysicalDeviceInfo,
    /// Swapchain for presenting frames
    swapchain: Option<Swapchain>,
    /// Logical device for operations
    device: LogicalDevice,
    /// Vulkan instance and debug utilities
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a context rendering into `window`
    pub fn new(window: &mut Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, enable_validation)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;

        let physical_device =
            PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(
            &instance.instance,
            device.device.clone(),
            surface,
            &surface_loader,
            &physical_device,
            vk::Extent2D { width, height },
            vk::SwapchainKHR::null(),
        )?;

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            swapchain: Some(swapchain),
            device,
            instance,
        })
    }

    /// Handles for resource creation
    pub fn gpu(&self) -> GpuDevice {
        GpuDevice {
            device: self.device.device.clone(),
            instance: self.instance.instance.clone(),
            physical_device: self.physical_device.device,
            graphics_queue: self.device.graphics_queue,
            present_queue: self.device.present_queue,
            graphics_family: self.physical_device.graphics_family,
            timestamp_period: self
                .physical_device
                .timestamps
                .then_some(self.physical_device.properties.limits.timestamp_period),
        }
    }

    /// Get the logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the swapchain
    pub fn swapchain(&self) -> VulkanResult<&Swapchain> {
        self.swapchain.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "swapchain was not created".to_string(),
        })
    }

    /// Recreate the swapchain for the window's current framebuffer size
    pub fn recreate_swapchain(&mut self, window: &Window) -> VulkanResult<()> {
        unsafe {
            self.device.device.device_wait_idle().map_err(VulkanError::Api)?;
        }

        let (width, height) = window.framebuffer_size();
        let old_swapchain = self
            .swapchain
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), Swapchain::handle);

        let new_swapchain = Swapchain::new(
            &self.instance.instance,
            self.device.device.clone(),
            self.surface,
            &self.surface_loader,
            &self.physical_device,
            vk::Extent2D { width, height },
            old_swapchain,
        )?;

        // The old swapchain is retired by the create call and destroyed on drop
        self.swapchain = Some(new_swapchain);
        log::info!("Swapchain recreated at {}x{}", width, height);
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.swapchain.take();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // `device` drops before `instance` (declaration order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_shared_queue_family_preferred() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let found = QueueFamilies::find(&families, |index| Ok(index != 0)).unwrap();
        assert_eq!(found, Some(QueueFamilies { graphics: 2, present: 2 }));
    }

    #[test]
    fn test_split_queue_families() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let found = QueueFamilies::find(&families, |index| Ok(index == 1)).unwrap();
        assert_eq!(found, Some(QueueFamilies { graphics: 0, present: 1 }));

        let none = QueueFamilies::find(&families, |_| Ok(false)).unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_discrete_gpu_ranks_first() {
        assert!(
            device_type_rank(vk::PhysicalDeviceType::DISCRETE_GPU)
                > device_type_rank(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert_eq!(device_type_rank(vk::PhysicalDeviceType::CPU), 0);
    }
}
