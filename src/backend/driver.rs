// Graphics driver seam
//
// Every Vulkan call the renderer makes goes through `Driver`. `AshDriver`
// (backend::vulkan) forwards to the real loader; tests swap in a recording
// mock. Handles are plain `vk::*` values so both sides speak the same types.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::{CStr, CString};

use super::error::BackendError;
use super::platform::{Platform, SurfaceTarget};

/// Parameters for the one queue submission a frame makes
#[derive(Debug, Clone, Copy)]
pub struct Submission {
    pub command_buffer: vk::CommandBuffer,
    pub wait: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal: vk::Semaphore,
}

pub trait Driver {
    // ─── Instance ────────────────────────────────────────────────────────────
    fn instance_extensions(&self) -> VkResult<Vec<CString>>;
    fn create_instance(
        &mut self,
        app_name: &str,
        extensions: &[&CStr],
        validation: bool,
    ) -> VkResult<vk::Instance>;
    fn destroy_instance(&mut self);

    // ─── Physical device ─────────────────────────────────────────────────────
    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn physical_device_properties(&self, physical_device: vk::PhysicalDevice)
        -> vk::PhysicalDeviceProperties;
    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<CString>>;
    fn queue_families(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    // ─── Logical device ──────────────────────────────────────────────────────
    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&CStr],
    ) -> VkResult<vk::Device>;
    /// Resolve the surface and swapchain entry points, failing on the first
    /// one the driver does not expose.
    fn load_extension_functions(&mut self, platform: Platform) -> Result<(), BackendError>;
    fn device_queue(&self, queue_family: u32) -> vk::Queue;
    fn device_wait_idle(&self) -> VkResult<()>;
    fn destroy_device(&mut self);

    // ─── Surface ─────────────────────────────────────────────────────────────
    fn create_surface(&mut self, target: &SurfaceTarget) -> VkResult<vk::SurfaceKHR>;
    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    // ─── Swapchain ───────────────────────────────────────────────────────────
    fn create_swapchain(&mut self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);

    // ─── Render targets ──────────────────────────────────────────────────────
    fn create_image_view(&mut self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&mut self, view: vk::ImageView);
    fn create_render_pass(&mut self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);
    fn create_framebuffer(&mut self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);

    // ─── Commands ────────────────────────────────────────────────────────────
    fn create_command_pool(&mut self, queue_family: u32) -> VkResult<vk::CommandPool>;
    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    fn destroy_command_pool(&mut self, pool: vk::CommandPool);
    fn begin_command_buffer(
        &mut self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()>;
    fn cmd_pipeline_barrier(
        &mut self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    );
    fn cmd_clear_color_image(
        &mut self,
        buffer: vk::CommandBuffer,
        image: vk::Image,
        color: &vk::ClearColorValue,
        range: vk::ImageSubresourceRange,
    );
    fn end_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()>;

    // ─── Synchronization & presentation ─────────────────────────────────────
    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore);
    /// Returns the image index and whether the swapchain is suboptimal
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    fn queue_submit(&mut self, queue: vk::Queue, submission: &Submission) -> VkResult<()>;
    /// Returns whether the swapchain is suboptimal
    fn queue_present(
        &mut self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool>;
}
