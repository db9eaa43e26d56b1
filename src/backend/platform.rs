// Platform surface plumbing
//
// Maps the raw window handles handed over by the windowing layer onto the
// matching VK_KHR_*_surface extension and creates the VkSurfaceKHR.

use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::{vk, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

use super::error::BackendError;

/// Window system the surface is created against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Win32,
    Xlib,
    Xcb,
    Wayland,
}

impl Platform {
    pub fn from_display(display: RawDisplayHandle) -> Result<Self, BackendError> {
        match display {
            RawDisplayHandle::Windows(_) => Ok(Platform::Win32),
            RawDisplayHandle::Xlib(_) => Ok(Platform::Xlib),
            RawDisplayHandle::Xcb(_) => Ok(Platform::Xcb),
            RawDisplayHandle::Wayland(_) => Ok(Platform::Wayland),
            other => Err(BackendError::UnsupportedPlatform(format!("{other:?}"))),
        }
    }

    /// Instance extension providing the platform surface
    pub fn surface_extension(self) -> &'static CStr {
        match self {
            Platform::Win32 => khr::Win32Surface::name(),
            Platform::Xlib => khr::XlibSurface::name(),
            Platform::Xcb => khr::XcbSurface::name(),
            Platform::Wayland => khr::WaylandSurface::name(),
        }
    }

    /// Entry point that creates the platform surface
    pub fn create_surface_fn(self) -> &'static CStr {
        match self {
            Platform::Win32 => c"vkCreateWin32SurfaceKHR",
            Platform::Xlib => c"vkCreateXlibSurfaceKHR",
            Platform::Xcb => c"vkCreateXcbSurfaceKHR",
            Platform::Wayland => c"vkCreateWaylandSurfaceKHR",
        }
    }

    /// Instance extensions required to present on this platform
    pub fn required_instance_extensions(self) -> [&'static CStr; 2] {
        [khr::Surface::name(), self.surface_extension()]
    }
}

/// Native handles of the window being presented to
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTarget {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

impl SurfaceTarget {
    pub fn platform(&self) -> Result<Platform, BackendError> {
        Platform::from_display(self.display)
    }
}

/// Create a surface for `target`.
///
/// # Safety
/// The handles in `target` must stay valid until the surface is destroyed.
pub unsafe fn create_surface(
    entry: &Entry,
    instance: &Instance,
    target: &SurfaceTarget,
) -> VkResult<vk::SurfaceKHR> {
    match (target.display, target.window) {
        (_, RawWindowHandle::Win32(handle)) => {
            let hinstance = handle.hinstance.map(|h| h.get()).unwrap_or(0) as vk::HINSTANCE;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(handle.hwnd.get() as vk::HWND);
            khr::Win32Surface::new(entry, instance).create_win32_surface(&create_info, None)
        }
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => {
            let dpy = display
                .display
                .map_or(std::ptr::null_mut(), |p| p.as_ptr().cast());
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy)
                .window(window.window);
            khr::XlibSurface::new(entry, instance).create_xlib_surface(&create_info, None)
        }
        (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window)) => {
            let connection = display
                .connection
                .map_or(std::ptr::null_mut(), |p| p.as_ptr().cast());
            let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                .connection(connection)
                .window(window.window.get());
            khr::XcbSurface::new(entry, instance).create_xcb_surface(&create_info, None)
        }
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr().cast())
                .surface(window.surface.as_ptr().cast());
            khr::WaylandSurface::new(entry, instance).create_wayland_surface(&create_info, None)
        }
        _ => Err(vk::Result::ERROR_INCOMPATIBLE_DISPLAY_KHR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, WindowsDisplayHandle, XlibDisplayHandle};
    use std::ptr::NonNull;

    #[test]
    fn display_kinds_map_to_platforms() {
        let xlib = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        assert_eq!(Platform::from_display(xlib).unwrap(), Platform::Xlib);

        let windows = RawDisplayHandle::Windows(WindowsDisplayHandle::new());
        assert_eq!(Platform::from_display(windows).unwrap(), Platform::Win32);

        let wayland = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(NonNull::dangling()));
        assert_eq!(Platform::from_display(wayland).unwrap(), Platform::Wayland);
    }

    #[test]
    fn required_extensions_pair_surface_with_platform() {
        assert_eq!(
            Platform::Win32.required_instance_extensions(),
            [c"VK_KHR_surface", c"VK_KHR_win32_surface"]
        );
        assert_eq!(
            Platform::Xcb.required_instance_extensions(),
            [c"VK_KHR_surface", c"VK_KHR_xcb_surface"]
        );
    }

    #[test]
    fn surface_entry_points_match_extensions() {
        for platform in [Platform::Win32, Platform::Xlib, Platform::Xcb, Platform::Wayland] {
            let ext = platform.surface_extension().to_str().unwrap();
            let func = platform.create_surface_fn().to_str().unwrap();
            let stem = ext.trim_start_matches("VK_KHR_").trim_end_matches("_surface");
            assert!(func.to_lowercase().contains(stem), "{func} vs {ext}");
        }
    }
}
