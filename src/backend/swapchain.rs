// Swapchain - Window presentation
//
// Picks presentation parameters from what the surface reports and builds the
// chain of images we clear and present. Recreation is possible by handing in
// the previous swapchain, but nothing at runtime asks for it.

use ash::vk;
use glam::UVec2;

use super::driver::Driver;
use super::error::{BackendError, Check};

/// Format used when the surface has no preference
pub const FALLBACK_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// A single UNDEFINED entry means "anything goes"; otherwise take the first
/// pair as reported.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    match formats {
        [only] if only.format == vk::Format::UNDEFINED => Some(FALLBACK_FORMAT),
        _ => formats.first().copied(),
    }
}

/// Current surface extent, or `fallback` clamped into the surface limits when
/// the surface leaves the size to us (width == u32::MAX).
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, fallback: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let min = UVec2::new(caps.min_image_extent.width, caps.min_image_extent.height);
    let max = UVec2::new(caps.max_image_extent.width, caps.max_image_extent.height);
    let size = UVec2::new(fallback.width, fallback.height).max(min).min(max);

    vk::Extent2D {
        width: size.x,
        height: size.y,
    }
}

/// One more than the minimum, capped when the surface has a maximum (0 = none)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && count > caps.max_image_count {
        caps.max_image_count
    } else {
        count
    }
}

/// Images are cleared with a transfer, so TRANSFER_DST is mandatory
pub fn choose_image_usage(
    caps: &vk::SurfaceCapabilitiesKHR,
) -> Result<vk::ImageUsageFlags, BackendError> {
    if caps
        .supported_usage_flags
        .contains(vk::ImageUsageFlags::TRANSFER_DST)
    {
        Ok(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
    } else {
        Err(BackendError::UnsupportedUsage)
    }
}

pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

/// MAILBOX: no tearing, lowest latency
/// FIFO: vsync, the one mode every driver must offer
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> Option<vk::PresentModeKHR> {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO]
        .into_iter()
        .find(|wanted| modes.contains(wanted))
}

/// Everything negotiated with the surface before creating the swapchain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapchainSettings {
    pub surface_format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub image_usage: vk::ImageUsageFlags,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

impl SwapchainSettings {
    pub fn negotiate(
        caps: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        fallback_extent: vk::Extent2D,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            surface_format: choose_surface_format(formats).ok_or(BackendError::NoSurfaceFormat)?,
            extent: choose_extent(caps, fallback_extent),
            image_count: choose_image_count(caps),
            image_usage: choose_image_usage(caps)?,
            pre_transform: choose_pre_transform(caps),
            present_mode: choose_present_mode(present_modes).ok_or(BackendError::NoPresentMode)?,
        })
    }

    /// Query the surface through `driver` and negotiate against it
    pub fn query<D: Driver>(
        driver: &D,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        fallback_extent: vk::Extent2D,
    ) -> Result<Self, BackendError> {
        let formats = driver
            .surface_formats(physical_device, surface)
            .check("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let caps = driver
            .surface_capabilities(physical_device, surface)
            .check("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let present_modes = driver
            .surface_present_modes(physical_device, surface)
            .check("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        Self::negotiate(&caps, &formats, &present_modes, fallback_extent)
    }
}

#[derive(Debug)]
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub settings: SwapchainSettings,
}

impl Swapchain {
    /// Create the swapchain. A previous swapchain passed as `old` is handed to
    /// the driver for resource reuse and destroyed once the new one exists.
    pub fn create<D: Driver>(
        driver: &mut D,
        surface: vk::SurfaceKHR,
        settings: SwapchainSettings,
        old: Option<Swapchain>,
    ) -> Result<Self, BackendError> {
        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}, {:?}",
            settings.extent.width,
            settings.extent.height,
            settings.image_count,
            settings.surface_format.format,
            settings.present_mode
        );

        let old_handle = old
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |old| old.handle);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(settings.image_count)
            .image_format(settings.surface_format.format)
            .image_color_space(settings.surface_format.color_space)
            .image_extent(settings.extent)
            .image_array_layers(1)
            .image_usage(settings.image_usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(settings.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(settings.present_mode)
            .clipped(true)
            .old_swapchain(old_handle);

        let created = driver.create_swapchain(&create_info);

        // The old swapchain is retired either way
        if let Some(old) = old {
            old.destroy(driver);
        }

        let handle = created.check("vkCreateSwapchainKHR")?;

        let images = match driver.swapchain_images(handle) {
            Ok(images) => images,
            Err(result) => {
                driver.destroy_swapchain(handle);
                return Err(BackendError::Driver {
                    call: "vkGetSwapchainImagesKHR",
                    result,
                });
            }
        };

        log::info!("Created swapchain with {} images", images.len());

        Ok(Self {
            handle,
            images,
            settings,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_swapchain(self.handle);
    }
}
