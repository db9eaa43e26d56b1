// Vulkan driver - ash-backed implementation of `Driver`
//
// Responsibilities:
// - Library loading and instance creation (optionally with validation)
// - Extension loaders (surface, swapchain) once the device exists
// - Thin forwarding of every other call to ash
//
// The driver owns the ash function tables; the renderer owns the handles and
// decides when each one is destroyed.

use ash::extensions::{ext, khr};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use std::ffi::{CStr, CString};

use super::driver::{Driver, Submission};
use super::error::BackendError;
use super::loader::ExtensionFunctions;
use super::platform::{self, Platform, SurfaceTarget};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct AshDriver {
    entry: Entry,
    instance: Option<ash::Instance>,
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    device: Option<ash::Device>,
    surface_loader: Option<khr::Surface>,
    swapchain_loader: Option<khr::Swapchain>,
}

impl AshDriver {
    /// Load the Vulkan library
    pub fn new() -> Result<Self, BackendError> {
        let entry = unsafe { Entry::load() }?;
        Ok(Self {
            entry,
            instance: None,
            debug_utils: None,
            device: None,
            surface_loader: None,
            swapchain_loader: None,
        })
    }

    fn instance(&self) -> VkResult<&ash::Instance> {
        self.instance.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn surface_loader(&self) -> VkResult<&khr::Surface> {
        self.surface_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
    }

    fn swapchain_loader(&self) -> VkResult<&khr::Swapchain> {
        self.swapchain_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
    }

    /// Validation needs both the layer and the debug-utils extension
    fn validation_available(&self) -> bool {
        let layers = self
            .entry
            .enumerate_instance_layer_properties()
            .unwrap_or_default();
        let has_layer = layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);

        let has_debug_utils = self
            .instance_extensions()
            .unwrap_or_default()
            .iter()
            .any(|name| name.as_c_str() == ext::DebugUtils::name());

        has_layer && has_debug_utils
    }

    fn setup_debug_messenger(
        &self,
        instance: &ash::Instance,
    ) -> VkResult<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ext::DebugUtils::new(&self.entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }
}

fn extension_names(properties: Vec<vk::ExtensionProperties>) -> Vec<CString> {
    properties
        .iter()
        .map(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) }.to_owned())
        .collect()
}

impl Driver for AshDriver {
    fn instance_extensions(&self) -> VkResult<Vec<CString>> {
        self.entry
            .enumerate_instance_extension_properties(None)
            .map(extension_names)
    }

    fn create_instance(
        &mut self,
        app_name: &str,
        extensions: &[&CStr],
        validation: bool,
    ) -> VkResult<vk::Instance> {
        let app_name = CString::new(app_name).unwrap_or_else(|_| c"hello-swapchain".to_owned());

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let validation = validation && {
            let available = self.validation_available();
            if !available {
                log::warn!("Validation requested but layer/debug utils are unavailable");
            }
            available
        };

        let mut extension_ptrs: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();
        let layer_names = if validation {
            extension_ptrs.push(ext::DebugUtils::name().as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }?;
        let handle = instance.handle();

        if validation {
            match self.setup_debug_messenger(&instance) {
                Ok(messenger) => self.debug_utils = Some(messenger),
                Err(e) => log::warn!("Failed to install debug messenger: {:?}", e),
            }
        }

        self.surface_loader = Some(khr::Surface::new(&self.entry, &instance));
        self.instance = Some(instance);
        Ok(handle)
    }

    fn destroy_instance(&mut self) {
        self.surface_loader = None;
        if let Some(instance) = self.instance.take() {
            unsafe {
                if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                    debug_utils.destroy_debug_utils_messenger(messenger, None);
                }
                instance.destroy_instance(None);
            }
        }
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }
    }

    fn physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        match self.instance() {
            Ok(instance) => unsafe { instance.get_physical_device_properties(physical_device) },
            Err(_) => vk::PhysicalDeviceProperties::default(),
        }
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        unsafe { self.instance()?.enumerate_device_extension_properties(physical_device) }
            .map(extension_names)
    }

    fn queue_families(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        match self.instance() {
            Ok(instance) => unsafe {
                instance.get_physical_device_queue_family_properties(physical_device)
            },
            Err(_) => Vec::new(),
        }
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&CStr],
    ) -> VkResult<vk::Device> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let extension_ptrs: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extension_ptrs);

        let device =
            unsafe { self.instance()?.create_device(physical_device, &create_info, None) }?;
        let handle = device.handle();
        self.device = Some(device);
        Ok(handle)
    }

    fn load_extension_functions(&mut self, platform: Platform) -> Result<(), BackendError> {
        let instance = self.instance().map_err(|result| BackendError::Driver {
            call: "vkGetInstanceProcAddr",
            result,
        })?;
        let device = self.device().map_err(|result| BackendError::Driver {
            call: "vkGetDeviceProcAddr",
            result,
        })?;

        ExtensionFunctions::load(&self.entry, instance, device.handle(), platform).verify(platform)?;

        let swapchain_loader = khr::Swapchain::new(instance, device);
        self.swapchain_loader = Some(swapchain_loader);
        Ok(())
    }

    fn device_queue(&self, queue_family: u32) -> vk::Queue {
        match self.device() {
            Ok(device) => unsafe { device.get_device_queue(queue_family, 0) },
            Err(_) => vk::Queue::null(),
        }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device()?.device_wait_idle() }
    }

    fn destroy_device(&mut self) {
        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn create_surface(&mut self, target: &SurfaceTarget) -> VkResult<vk::SurfaceKHR> {
        unsafe { platform::create_surface(&self.entry, self.instance()?, target) }
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface_loader()?.get_physical_device_surface_support(
                physical_device,
                queue_family,
                surface,
            )
        }
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_formats(physical_device, surface)
        }
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(physical_device, surface)
        }
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_present_modes(physical_device, surface)
        }
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Ok(loader) = self.surface_loader() {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn create_swapchain(&mut self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader()?.create_swapchain(info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if let Ok(loader) = self.swapchain_loader() {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn create_image_view(&mut self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        unsafe { self.device()?.create_image_view(info, None) }
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_image_view(view, None) };
        }
    }

    fn create_render_pass(&mut self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        unsafe { self.device()?.create_render_pass(info, None) }
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_framebuffer(&mut self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        unsafe { self.device()?.create_framebuffer(info, None) }
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn create_command_pool(&mut self, queue_family: u32) -> VkResult<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo::builder().queue_family_index(queue_family);
        unsafe { self.device()?.create_command_pool(&pool_info, None) }
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { self.device()?.allocate_command_buffers(&alloc_info) }
    }

    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if let Ok(device) = self.device() {
            unsafe { device.free_command_buffers(pool, buffers) };
        }
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_command_pool(pool, None) };
        }
    }

    fn begin_command_buffer(
        &mut self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device()?.begin_command_buffer(buffer, &begin_info) }
    }

    fn cmd_pipeline_barrier(
        &mut self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    ) {
        if let Ok(device) = self.device() {
            unsafe {
                device.cmd_pipeline_barrier(
                    buffer,
                    src_stage,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    std::slice::from_ref(barrier),
                );
            }
        }
    }

    fn cmd_clear_color_image(
        &mut self,
        buffer: vk::CommandBuffer,
        image: vk::Image,
        color: &vk::ClearColorValue,
        range: vk::ImageSubresourceRange,
    ) {
        if let Ok(device) = self.device() {
            unsafe {
                device.cmd_clear_color_image(
                    buffer,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    color,
                    &[range],
                );
            }
        }
    }

    fn end_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(buffer) }
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device()?.create_semaphore(&semaphore_info, None) }
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_semaphore(semaphore, None) };
        }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader()?
                .acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        }
    }

    fn queue_submit(&mut self, queue: vk::Queue, submission: &Submission) -> VkResult<()> {
        let wait_semaphores = [submission.wait];
        let wait_stages = [submission.wait_stage];
        let command_buffers = [submission.command_buffer];
        let signal_semaphores = [submission.signal];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.device()?
                .queue_submit(queue, &[submit_info], vk::Fence::null())
        }
    }

    fn queue_present(
        &mut self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader()?.queue_present(queue, &present_info) }
    }
}

impl Drop for AshDriver {
    fn drop(&mut self) {
        // The renderer destroys both explicitly; this only covers a driver
        // that was dropped halfway through bring-up.
        self.destroy_device();
        self.destroy_instance();
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
