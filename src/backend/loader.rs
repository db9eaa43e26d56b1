// Extension entry points
//
// Surface and swapchain functions are not part of core Vulkan 1.0, so they
// are resolved by name after the device exists. Each one is kept as its own
// optional handle and checked individually, which turns a driver that
// advertises an extension but lacks a symbol into a named error instead of a
// null call later on.
//
// The table is only used to verify that every symbol resolves; the calls
// themselves go through ash's khr::Surface and khr::Swapchain loaders.

use ash::{vk, Entry, Instance};
use std::ffi::CStr;

use super::error::BackendError;
use super::platform::Platform;

/// Raw addresses of the extension functions the renderer calls
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionFunctions {
    // Instance level
    pub get_physical_device_surface_formats: vk::PFN_vkVoidFunction,
    pub get_physical_device_surface_capabilities: vk::PFN_vkVoidFunction,
    pub get_physical_device_surface_present_modes: vk::PFN_vkVoidFunction,
    pub create_platform_surface: vk::PFN_vkVoidFunction,
    pub destroy_surface: vk::PFN_vkVoidFunction,

    // Device level
    pub create_swapchain: vk::PFN_vkVoidFunction,
    pub destroy_swapchain: vk::PFN_vkVoidFunction,
    pub get_swapchain_images: vk::PFN_vkVoidFunction,
    pub acquire_next_image: vk::PFN_vkVoidFunction,
    pub queue_present: vk::PFN_vkVoidFunction,
}

impl ExtensionFunctions {
    /// Look up every entry point by name
    pub fn load(entry: &Entry, instance: &Instance, device: vk::Device, platform: Platform) -> Self {
        let instance_fn = |name: &CStr| unsafe {
            (entry.static_fn().get_instance_proc_addr)(instance.handle(), name.as_ptr())
        };
        let device_fn = |name: &CStr| unsafe {
            (instance.fp_v1_0().get_device_proc_addr)(device, name.as_ptr())
        };

        Self {
            get_physical_device_surface_formats: instance_fn(c"vkGetPhysicalDeviceSurfaceFormatsKHR"),
            get_physical_device_surface_capabilities: instance_fn(
                c"vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
            ),
            get_physical_device_surface_present_modes: instance_fn(
                c"vkGetPhysicalDeviceSurfacePresentModesKHR",
            ),
            create_platform_surface: instance_fn(platform.create_surface_fn()),
            destroy_surface: instance_fn(c"vkDestroySurfaceKHR"),
            create_swapchain: device_fn(c"vkCreateSwapchainKHR"),
            destroy_swapchain: device_fn(c"vkDestroySwapchainKHR"),
            get_swapchain_images: device_fn(c"vkGetSwapchainImagesKHR"),
            acquire_next_image: device_fn(c"vkAcquireNextImageKHR"),
            queue_present: device_fn(c"vkQueuePresentKHR"),
        }
    }

    fn entries(&self, platform: Platform) -> [(&'static str, bool); 10] {
        let surface_fn = platform
            .create_surface_fn()
            .to_str()
            .unwrap_or("vkCreate*SurfaceKHR");
        [
            (
                "vkGetPhysicalDeviceSurfaceFormatsKHR",
                self.get_physical_device_surface_formats.is_some(),
            ),
            (
                "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
                self.get_physical_device_surface_capabilities.is_some(),
            ),
            (
                "vkGetPhysicalDeviceSurfacePresentModesKHR",
                self.get_physical_device_surface_present_modes.is_some(),
            ),
            (surface_fn, self.create_platform_surface.is_some()),
            ("vkDestroySurfaceKHR", self.destroy_surface.is_some()),
            ("vkCreateSwapchainKHR", self.create_swapchain.is_some()),
            ("vkDestroySwapchainKHR", self.destroy_swapchain.is_some()),
            ("vkGetSwapchainImagesKHR", self.get_swapchain_images.is_some()),
            ("vkAcquireNextImageKHR", self.acquire_next_image.is_some()),
            ("vkQueuePresentKHR", self.queue_present.is_some()),
        ]
    }

    /// Fail on the first entry point that did not resolve
    pub fn verify(&self, platform: Platform) -> Result<(), BackendError> {
        for (name, loaded) in self.entries(platform) {
            if !loaded {
                return Err(BackendError::MissingFunction(name));
            }
            log::trace!("Loaded {}", name);
        }
        Ok(())
    }
}
