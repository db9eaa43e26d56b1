// Recording driver for tests
//
// Hands out fake handles, logs every call under its Vulkan entry point name,
// and can be told to fail a given call or script acquire/present results.

use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ffi::{CStr, CString};
use std::rc::Rc;

use super::driver::{Driver, Submission};
use super::error::BackendError;
use super::platform::{Platform, SurfaceTarget};

#[derive(Debug, Clone, Copy)]
pub struct SwapchainRecord {
    pub handle: vk::SwapchainKHR,
    pub min_image_count: u32,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub present_mode: vk::PresentModeKHR,
    pub usage: vk::ImageUsageFlags,
    pub old_swapchain: vk::SwapchainKHR,
}

#[derive(Debug, Clone, Copy)]
pub struct BarrierRecord {
    pub command_buffer: vk::CommandBuffer,
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

#[derive(Debug, Default)]
pub struct Log {
    pub calls: Vec<&'static str>,
    pub created_instance_extensions: Vec<CString>,
    pub created_device_extensions: Vec<CString>,
    pub validation_requested: bool,
    pub swapchains: Vec<SwapchainRecord>,
    pub destroyed_swapchains: Vec<vk::SwapchainKHR>,
    pub framebuffer_extents: Vec<vk::Extent2D>,
    pub freed_command_buffers: usize,
    pub begin_flags: Vec<vk::CommandBufferUsageFlags>,
    pub barriers: Vec<BarrierRecord>,
    pub submits: Vec<Submission>,
    pub presents: Vec<u32>,
}

impl Log {
    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|call| **call == name).count()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.nth_position(name, 0)
    }

    pub fn nth_position(&self, name: &str, n: usize) -> Option<usize> {
        self.calls
            .iter()
            .enumerate()
            .filter(|(_, call)| **call == name)
            .nth(n)
            .map(|(index, _)| index)
    }
}

pub struct MockDriver {
    log: Rc<RefCell<Log>>,
    next_handle: Cell<u64>,

    pub instance_extensions: Vec<CString>,
    pub device_extensions: Vec<CString>,
    pub physical_devices: usize,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub surface_support: bool,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,

    failure: Option<(&'static str, vk::Result)>,
    missing_function: Option<&'static str>,
    acquire_results: VecDeque<VkResult<(u32, bool)>>,
    present_results: VecDeque<VkResult<bool>>,
    acquired: u32,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            log: Rc::default(),
            next_handle: Cell::new(0x1000),
            instance_extensions: vec![
                CString::from(ash::extensions::khr::Surface::name()),
                CString::from(ash::extensions::khr::XlibSurface::name()),
            ],
            device_extensions: vec![CString::from(ash::extensions::khr::Swapchain::name())],
            physical_devices: 1,
            queue_families: vec![vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            }],
            surface_support: true,
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::TRANSFER_DST,
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            failure: None,
            missing_function: None,
            acquire_results: VecDeque::new(),
            present_results: VecDeque::new(),
            acquired: 0,
        }
    }
}

impl MockDriver {
    /// Shared view of the call log that outlives moves of the driver
    pub fn log(&self) -> Rc<RefCell<Log>> {
        Rc::clone(&self.log)
    }

    /// Every call to `name` returns `result` instead of succeeding
    pub fn fail_on(mut self, name: &'static str, result: vk::Result) -> Self {
        self.failure = Some((name, result));
        self
    }

    /// Pretend the driver does not export this extension entry point
    pub fn without_function(mut self, name: &'static str) -> Self {
        self.missing_function = Some(name);
        self
    }

    pub fn with_instance_extensions(mut self, names: &[&CStr]) -> Self {
        self.instance_extensions = names.iter().map(|name| CString::from(*name)).collect();
        self
    }

    pub fn with_device_extensions(mut self, names: &[&CStr]) -> Self {
        self.device_extensions = names.iter().map(|name| CString::from(*name)).collect();
        self
    }

    pub fn script_acquire(&mut self, result: VkResult<(u32, bool)>) {
        self.acquire_results.push_back(result);
    }

    pub fn script_present(&mut self, result: VkResult<bool>) {
        self.present_results.push_back(result);
    }

    fn handle<H: Handle>(&self) -> H {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        H::from_raw(raw)
    }

    /// Log the call, then report the configured failure if it targets `name`
    fn call(&self, name: &'static str) -> VkResult<()> {
        self.log.borrow_mut().calls.push(name);
        match self.failure {
            Some((failing, result)) if failing == name => Err(result),
            _ => Ok(()),
        }
    }

    fn record(&self, name: &'static str) {
        self.log.borrow_mut().calls.push(name);
    }
}

impl Driver for MockDriver {
    fn instance_extensions(&self) -> VkResult<Vec<CString>> {
        self.call("vkEnumerateInstanceExtensionProperties")?;
        Ok(self.instance_extensions.clone())
    }

    fn create_instance(
        &mut self,
        _app_name: &str,
        extensions: &[&CStr],
        validation: bool,
    ) -> VkResult<vk::Instance> {
        self.call("vkCreateInstance")?;
        let mut log = self.log.borrow_mut();
        log.created_instance_extensions = extensions.iter().map(|name| CString::from(*name)).collect();
        log.validation_requested = validation;
        drop(log);
        Ok(self.handle())
    }

    fn destroy_instance(&mut self) {
        self.record("vkDestroyInstance");
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.call("vkEnumeratePhysicalDevices")?;
        Ok((0..self.physical_devices).map(|_| self.handle()).collect())
    }

    fn physical_device_properties(
        &self,
        _physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        self.record("vkGetPhysicalDeviceProperties");
        let mut props = vk::PhysicalDeviceProperties {
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            ..Default::default()
        };
        for (dst, src) in props.device_name.iter_mut().zip(b"Mock GPU\0") {
            *dst = *src as std::ffi::c_char;
        }
        props.limits.max_image_dimension2_d = 16384;
        props
    }

    fn device_extensions(&self, _physical_device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        self.call("vkEnumerateDeviceExtensionProperties")?;
        Ok(self.device_extensions.clone())
    }

    fn queue_families(&self, _physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.record("vkGetPhysicalDeviceQueueFamilyProperties");
        self.queue_families.clone()
    }

    fn create_device(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        _queue_family: u32,
        extensions: &[&CStr],
    ) -> VkResult<vk::Device> {
        self.call("vkCreateDevice")?;
        self.log.borrow_mut().created_device_extensions =
            extensions.iter().map(|name| CString::from(*name)).collect();
        Ok(self.handle())
    }

    fn load_extension_functions(&mut self, _platform: Platform) -> Result<(), BackendError> {
        self.record("vkGetDeviceProcAddr");
        match self.missing_function {
            Some(name) => Err(BackendError::MissingFunction(name)),
            None => Ok(()),
        }
    }

    fn device_queue(&self, _queue_family: u32) -> vk::Queue {
        self.record("vkGetDeviceQueue");
        self.handle()
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.call("vkDeviceWaitIdle")
    }

    fn destroy_device(&mut self) {
        self.record("vkDestroyDevice");
    }

    fn create_surface(&mut self, target: &SurfaceTarget) -> VkResult<vk::SurfaceKHR> {
        let name = target
            .platform()
            .ok()
            .and_then(|platform| platform.create_surface_fn().to_str().ok())
            .unwrap_or("vkCreateSurfaceKHR");
        self.call(name)?;
        Ok(self.handle())
    }

    fn surface_support(
        &self,
        _physical_device: vk::PhysicalDevice,
        _queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        self.call("vkGetPhysicalDeviceSurfaceSupportKHR")?;
        Ok(self.surface_support)
    }

    fn surface_formats(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.call("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        Ok(self.formats.clone())
    }

    fn surface_capabilities(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        Ok(self.capabilities)
    }

    fn surface_present_modes(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.call("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
        Ok(self.present_modes.clone())
    }

    fn destroy_surface(&mut self, _surface: vk::SurfaceKHR) {
        self.record("vkDestroySurfaceKHR");
    }

    fn create_swapchain(&mut self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        self.call("vkCreateSwapchainKHR")?;
        let handle = self.handle();
        self.log.borrow_mut().swapchains.push(SwapchainRecord {
            handle,
            min_image_count: info.min_image_count,
            extent: info.image_extent,
            format: info.image_format,
            present_mode: info.present_mode,
            usage: info.image_usage,
            old_swapchain: info.old_swapchain,
        });
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.call("vkGetSwapchainImagesKHR")?;
        let count = self
            .log
            .borrow()
            .swapchains
            .iter()
            .find(|record| record.handle == swapchain)
            .map_or(0, |record| record.min_image_count);
        Ok((0..count).map(|_| self.handle()).collect())
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.record("vkDestroySwapchainKHR");
        self.log.borrow_mut().destroyed_swapchains.push(swapchain);
    }

    fn create_image_view(&mut self, _info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        self.call("vkCreateImageView")?;
        Ok(self.handle())
    }

    fn destroy_image_view(&mut self, _view: vk::ImageView) {
        self.record("vkDestroyImageView");
    }

    fn create_render_pass(&mut self, _info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        self.call("vkCreateRenderPass")?;
        Ok(self.handle())
    }

    fn destroy_render_pass(&mut self, _render_pass: vk::RenderPass) {
        self.record("vkDestroyRenderPass");
    }

    fn create_framebuffer(&mut self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        self.call("vkCreateFramebuffer")?;
        self.log.borrow_mut().framebuffer_extents.push(vk::Extent2D {
            width: info.width,
            height: info.height,
        });
        Ok(self.handle())
    }

    fn destroy_framebuffer(&mut self, _framebuffer: vk::Framebuffer) {
        self.record("vkDestroyFramebuffer");
    }

    fn create_command_pool(&mut self, _queue_family: u32) -> VkResult<vk::CommandPool> {
        self.call("vkCreateCommandPool")?;
        Ok(self.handle())
    }

    fn allocate_command_buffers(
        &mut self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.call("vkAllocateCommandBuffers")?;
        Ok((0..count).map(|_| self.handle()).collect())
    }

    fn free_command_buffers(&mut self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.record("vkFreeCommandBuffers");
        self.log.borrow_mut().freed_command_buffers += buffers.len();
    }

    fn destroy_command_pool(&mut self, _pool: vk::CommandPool) {
        self.record("vkDestroyCommandPool");
    }

    fn begin_command_buffer(
        &mut self,
        _buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        self.call("vkBeginCommandBuffer")?;
        self.log.borrow_mut().begin_flags.push(flags);
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &mut self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    ) {
        self.record("vkCmdPipelineBarrier");
        self.log.borrow_mut().barriers.push(BarrierRecord {
            command_buffer: buffer,
            image: barrier.image,
            old_layout: barrier.old_layout,
            new_layout: barrier.new_layout,
            src_stage,
            dst_stage,
        });
    }

    fn cmd_clear_color_image(
        &mut self,
        _buffer: vk::CommandBuffer,
        _image: vk::Image,
        _color: &vk::ClearColorValue,
        _range: vk::ImageSubresourceRange,
    ) {
        self.record("vkCmdClearColorImage");
    }

    fn end_command_buffer(&mut self, _buffer: vk::CommandBuffer) -> VkResult<()> {
        self.call("vkEndCommandBuffer")
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        self.call("vkCreateSemaphore")?;
        Ok(self.handle())
    }

    fn destroy_semaphore(&mut self, _semaphore: vk::Semaphore) {
        self.record("vkDestroySemaphore");
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.call("vkAcquireNextImageKHR")?;
        if let Some(result) = self.acquire_results.pop_front() {
            return result;
        }

        let images = self
            .log
            .borrow()
            .swapchains
            .iter()
            .find(|record| record.handle == swapchain)
            .map_or(1, |record| record.min_image_count.max(1));
        let index = self.acquired % images;
        self.acquired += 1;
        Ok((index, false))
    }

    fn queue_submit(&mut self, _queue: vk::Queue, submission: &Submission) -> VkResult<()> {
        self.call("vkQueueSubmit")?;
        self.log.borrow_mut().submits.push(*submission);
        Ok(())
    }

    fn queue_present(
        &mut self,
        _queue: vk::Queue,
        _swapchain: vk::SwapchainKHR,
        image_index: u32,
        _wait: vk::Semaphore,
    ) -> VkResult<bool> {
        self.call("vkQueuePresentKHR")?;
        self.log.borrow_mut().presents.push(image_index);
        self.present_results.pop_front().unwrap_or(Ok(false))
    }
}
