/// Instance, surface, physical device and logical device creation

use ash::vk;
use car_engine::car::render::{ContextConfig, NativeWindow};
use car_engine::car::{Error, Result};
use car_engine::{engine_error, engine_info, engine_warn};
use std::ffi::CString;

/// Queue family indices a device must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    /// Always a graphics-capable family (graphics implies transfer)
    pub transfer: u32,
}

/// Pick graphics, present and transfer families from a device's families
///
/// `supports_present(i)` reports whether family `i` can present to the
/// surface. A family that does both graphics and present is preferred.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let graphics_families: Vec<u32> = families
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|(i, _)| i as u32)
        .collect();

    if let Some(&both) = graphics_families.iter().find(|&&i| supports_present(i)) {
        return Some(QueueFamilies { graphics: both, present: both, transfer: both });
    }

    let graphics = *graphics_families.first()?;
    let present = (0..families.len() as u32).find(|&i| families[i as usize].queue_count > 0 && supports_present(i))?;
    Some(QueueFamilies { graphics, present, transfer: graphics })
}

/// Objects created while bringing up the device, before the swapchain
pub(crate) struct DeviceBootstrap {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    pub surface_loader: ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub families: QueueFamilies,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

fn init_err(message: String) -> Error {
    engine_error!("car::vulkan", "{}", message);
    Error::InitializationFailed(message)
}

/// Create everything up to the logical device for `window`
pub(crate) fn bootstrap<W: NativeWindow + ?Sized>(window: &W, config: &ContextConfig) -> Result<DeviceBootstrap> {
    unsafe {
        let entry = ash::Entry::load()
            .map_err(|e| init_err(format!("Failed to load Vulkan library: {:?}", e)))?;

        let app_name = CString::new(config.app_name.as_str())
            .unwrap_or_else(|_| CString::from(c"Car Application"));
        let (major, minor, patch) = config.app_version;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"Car")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let display_handle = window
            .display_handle()
            .map_err(|e| init_err(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| init_err(format!("Failed to get window handle: {}", e)))?;

        #[allow(unused_mut)]
        let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| init_err(format!("Failed to get required extensions: {}", e)))?
            .to_vec();

        #[allow(unused_mut)]
        let mut layer_names: Vec<*const std::os::raw::c_char> = Vec::new();

        let validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
        if config.enable_validation && !validation {
            engine_warn!(
                "car::vulkan",
                "Validation requested but the crate was built without the 'vulkan-validation' feature; ignoring"
            );
        }
        #[cfg(feature = "vulkan-validation")]
        if validation {
            let layers = entry
                .enumerate_instance_layer_properties()
                .map_err(|e| init_err(format!("Failed to enumerate instance layers: {:?}", e)))?;
            let available = layers.iter().any(|layer| {
                layer
                    .layer_name_as_c_str()
                    .map(|name| name == c"VK_LAYER_KHRONOS_validation")
                    .unwrap_or(false)
            });
            if !available {
                return Err(init_err("Validation requested but VK_LAYER_KHRONOS_validation is not installed".to_string()));
            }
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = entry
            .create_instance(&create_info, None)
            .map_err(|e| init_err(format!("Failed to create Vulkan instance: {:?}", e)))?;

        let (debug_utils_loader, debug_messenger) = create_debug_messenger(&entry, &instance, validation)?;

        let surface = ash_window::create_surface(
            &entry,
            &instance,
            display_handle.as_raw(),
            window_handle.as_raw(),
            None,
        )
        .map_err(|e| init_err(format!("Failed to create surface: {:?}", e)))?;

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let (physical_device, families) = pick_physical_device(&instance, &surface_loader, surface)?;

        let properties = instance.get_physical_device_properties(physical_device);
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_string());
        engine_info!(
            "car::vulkan",
            "Using GPU '{}' (graphics family {}, present family {})",
            device_name,
            families.graphics,
            families.present
        );

        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(families.graphics)
            .queue_priorities(&queue_priorities)];
        if families.present != families.graphics {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(families.present)
                    .queue_priorities(&queue_priorities),
            );
        }

        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        let device = instance
            .create_device(physical_device, &device_create_info, None)
            .map_err(|e| init_err(format!("Failed to create logical device: {:?}", e)))?;

        let graphics_queue = device.get_device_queue(families.graphics, 0);
        let present_queue = device.get_device_queue(families.present, 0);

        Ok(DeviceBootstrap {
            entry,
            instance,
            debug_utils_loader,
            debug_messenger,
            surface_loader,
            surface,
            physical_device,
            families,
            device,
            graphics_queue,
            present_queue,
        })
    }
}

#[cfg(feature = "vulkan-validation")]
unsafe fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    validation: bool,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    if !validation {
        return Ok((None, None));
    }
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    crate::debug::init_debug_config(crate::debug::DebugSeverity::ErrorsAndWarnings);

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = debug_utils
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| init_err(format!("Failed to create debug messenger: {:?}", e)))?;

    Ok((Some(debug_utils), Some(messenger)))
}

#[cfg(not(feature = "vulkan-validation"))]
unsafe fn create_debug_messenger(
    _entry: &ash::Entry,
    _instance: &ash::Instance,
    _validation: bool,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    Ok((None, None))
}

/// First device with the queue families we need, swapchain support and at
/// least one surface format and present mode
unsafe fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(|e| init_err(format!("Failed to enumerate physical devices: {:?}", e)))?;

    if physical_devices.is_empty() {
        return Err(init_err("No Vulkan-capable GPU found".to_string()));
    }

    for physical_device in physical_devices {
        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
        let families = find_queue_families(&queue_families, |i| {
            surface_loader
                .get_physical_device_surface_support(physical_device, i, surface)
                .unwrap_or(false)
        });
        let Some(families) = families else { continue };

        let has_swapchain = instance
            .enumerate_device_extension_properties(physical_device)
            .map(|extensions| {
                extensions.iter().any(|ext| {
                    ext.extension_name_as_c_str()
                        .map(|name| name == ash::khr::swapchain::NAME)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false);
        if !has_swapchain {
            continue;
        }

        let formats = surface_loader
            .get_physical_device_surface_formats(physical_device, surface)
            .unwrap_or_default();
        let present_modes = surface_loader
            .get_physical_device_surface_present_modes(physical_device, surface)
            .unwrap_or_default();
        if formats.is_empty() || present_modes.is_empty() {
            continue;
        }

        return Ok((physical_device, families));
    }

    Err(init_err("No GPU supports graphics, presentation and swapchains for this surface".to_string()))
}
