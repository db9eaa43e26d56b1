// Device selection
//
// Responsibilities:
// - Describe each enumerated GPU for logging and selection
// - Physical device choice through a pluggable policy (default: first one)
// - Graphics queue family lookup

use ash::vk;
use std::ffi::CStr;

use super::driver::Driver;
use super::error::{BackendError, Check};

/// What the selector gets to see about each GPU
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
}

impl PhysicalDeviceInfo {
    pub fn from_properties(handle: vk::PhysicalDevice, props: &vk::PhysicalDeviceProperties) -> Self {
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Self {
            handle,
            name,
            device_type: props.device_type,
            max_image_dimension_2d: props.limits.max_image_dimension2_d,
        }
    }
}

/// Chooses one device out of everything the driver enumerated
pub trait DevicePolicy {
    /// Index into `candidates`, or `None` if nothing is acceptable
    fn select(&self, candidates: &[PhysicalDeviceInfo]) -> Option<usize>;
}

/// Take the first enumerated device, whatever it is.
///
/// No scoring by type, memory or features happens here; a different policy
/// can be passed to the renderer instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstEnumerated;

impl DevicePolicy for FirstEnumerated {
    fn select(&self, candidates: &[PhysicalDeviceInfo]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Enumerate GPUs, log them, and let `policy` pick one
pub fn select_physical_device<D: Driver>(
    driver: &D,
    policy: &dyn DevicePolicy,
) -> Result<PhysicalDeviceInfo, BackendError> {
    let devices = driver.physical_devices().check("vkEnumeratePhysicalDevices")?;

    let candidates: Vec<_> = devices
        .into_iter()
        .map(|handle| {
            PhysicalDeviceInfo::from_properties(handle, &driver.physical_device_properties(handle))
        })
        .collect();

    log::info!("Found {} GPUs", candidates.len());
    for info in &candidates {
        log::info!(
            "  {} ({:?}), max texture size {}",
            info.name,
            info.device_type,
            info.max_image_dimension_2d
        );
    }

    let index = policy
        .select(&candidates)
        .ok_or(BackendError::NoPhysicalDevice)?;
    let selected = candidates
        .into_iter()
        .nth(index)
        .ok_or(BackendError::NoPhysicalDevice)?;

    log::info!("Selected GPU: {}", selected.name);
    Ok(selected)
}

/// First family that has at least one queue and supports graphics
pub fn graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|index| index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    fn info(raw: u64, device_type: vk::PhysicalDeviceType) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: format!("gpu{raw}"),
            device_type,
            max_image_dimension_2d: 16384,
        }
    }

    #[test]
    fn first_device_wins_regardless_of_type() {
        let candidates = [
            info(1, vk::PhysicalDeviceType::CPU),
            info(2, vk::PhysicalDeviceType::DISCRETE_GPU),
        ];
        assert_eq!(FirstEnumerated.select(&candidates), Some(0));
    }

    #[test]
    fn no_devices_no_selection() {
        assert_eq!(FirstEnumerated.select(&[]), None);
    }

    #[test]
    fn graphics_family_is_first_match() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 2),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::GRAPHICS, 4),
        ];
        assert_eq!(graphics_queue_family(&families), Some(1));
    }

    #[test]
    fn empty_graphics_family_is_skipped() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(graphics_queue_family(&families), Some(1));
    }

    #[test]
    fn compute_only_has_no_graphics_family() {
        let families = [family(vk::QueueFlags::COMPUTE, 8)];
        assert_eq!(graphics_queue_family(&families), None);
    }

    #[test]
    fn properties_name_is_read_up_to_nul() {
        let mut props = vk::PhysicalDeviceProperties::default();
        for (dst, src) in props.device_name.iter_mut().zip(b"Mock GPU\0") {
            *dst = *src as std::ffi::c_char;
        }
        props.limits.max_image_dimension2_d = 8192;
        let info = PhysicalDeviceInfo::from_properties(vk::PhysicalDevice::null(), &props);
        assert_eq!(info.name, "Mock GPU");
        assert_eq!(info.max_image_dimension_2d, 8192);
    }
}
