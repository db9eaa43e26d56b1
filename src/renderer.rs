// Renderer - owns every Vulkan object of the clear-and-present loop
//
// Objects are created in a fixed order by `init` and torn down in exactly the
// reverse order by `Drop`, which also covers a setup that failed halfway:
// only objects that were actually created get destroyed.
//
// Creation order:
//   instance → physical device → device + queue → extension functions
//   → surface → semaphores → swapchain → command buffers → render targets

use ash::extensions::khr;
use ash::vk;

use crate::backend::capabilities;
use crate::backend::commands::ClearCommands;
use crate::backend::device::{self, DevicePolicy, PhysicalDeviceInfo};
use crate::backend::error::{Check, ExtensionKind};
use crate::backend::frame::{FramePresenter, FrameResources};
use crate::backend::swapchain::{Swapchain, SwapchainSettings};
use crate::backend::sync::FrameSync;
use crate::backend::targets::RenderTargets;
use crate::backend::{BackendError, Driver, FrameOutcome, SurfaceTarget};

/// What the renderer needs to know from the application config
#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub app_name: String,
    pub validation: bool,
    pub clear_color: [f32; 4],
    /// Used only when the surface leaves the extent up to us
    pub fallback_extent: vk::Extent2D,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            app_name: "hello-swapchain".to_string(),
            validation: false,
            clear_color: [0.0, 1.0, 0.0, 0.0],
            fallback_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
        }
    }
}

pub struct Renderer<D: Driver> {
    driver: D,

    // Fields in creation order
    instance: Option<vk::Instance>,
    physical_device: Option<PhysicalDeviceInfo>,
    queue_family: u32,
    device: Option<vk::Device>,
    queue: vk::Queue,
    surface: Option<vk::SurfaceKHR>,
    sync: Option<FrameSync>,
    swapchain: Option<Swapchain>,
    commands: Option<ClearCommands>,
    targets: Option<RenderTargets>,

    presenter: FramePresenter,
}

impl<D: Driver> Renderer<D> {
    /// Bring up everything needed to present to `target`.
    ///
    /// On error, whatever was created before the failing call has already
    /// been destroyed when this returns.
    pub fn new(
        driver: D,
        settings: &RendererSettings,
        target: &SurfaceTarget,
        policy: &dyn DevicePolicy,
    ) -> Result<Self, BackendError> {
        let mut renderer = Self {
            driver,
            instance: None,
            physical_device: None,
            queue_family: 0,
            device: None,
            queue: vk::Queue::null(),
            surface: None,
            sync: None,
            swapchain: None,
            commands: None,
            targets: None,
            presenter: FramePresenter::default(),
        };

        renderer.init(settings, target, policy)?;
        Ok(renderer)
    }

    fn init(
        &mut self,
        settings: &RendererSettings,
        target: &SurfaceTarget,
        policy: &dyn DevicePolicy,
    ) -> Result<(), BackendError> {
        // ─── Instance ────────────────────────────────────────────────────────
        let platform = target.platform()?;
        let instance_extensions = platform.required_instance_extensions();
        let available = self
            .driver
            .instance_extensions()
            .check("vkEnumerateInstanceExtensionProperties")?;
        capabilities::negotiate(ExtensionKind::Instance, &instance_extensions, &available)?;

        let instance = self
            .driver
            .create_instance(&settings.app_name, &instance_extensions, settings.validation)
            .check("vkCreateInstance")?;
        self.instance = Some(instance);
        log::info!("Vulkan instance created for {:?}", platform);

        // ─── Physical device + queue family ──────────────────────────────────
        let physical_device = device::select_physical_device(&self.driver, policy)?;
        let pd = physical_device.handle;

        let device_extensions = [khr::Swapchain::name()];
        let available = self
            .driver
            .device_extensions(pd)
            .check("vkEnumerateDeviceExtensionProperties")?;
        capabilities::negotiate(ExtensionKind::Device, &device_extensions, &available)?;

        let families = self.driver.queue_families(pd);
        log::info!("{} queue families", families.len());
        let queue_family =
            device::graphics_queue_family(&families).ok_or(BackendError::NoGraphicsQueue)?;
        log::info!("Using queue family {}", queue_family);

        self.physical_device = Some(physical_device);
        self.queue_family = queue_family;

        // ─── Logical device ──────────────────────────────────────────────────
        let device = self
            .driver
            .create_device(pd, queue_family, &device_extensions)
            .check("vkCreateDevice")?;
        self.device = Some(device);

        self.driver.load_extension_functions(platform)?;
        self.queue = self.driver.device_queue(queue_family);

        // ─── Presentation ────────────────────────────────────────────────────
        let create_surface_call = platform
            .create_surface_fn()
            .to_str()
            .unwrap_or("vkCreateSurfaceKHR");
        let surface = self
            .driver
            .create_surface(target)
            .check(create_surface_call)?;
        self.surface = Some(surface);

        let supported = self
            .driver
            .surface_support(pd, queue_family, surface)
            .check("vkGetPhysicalDeviceSurfaceSupportKHR")?;
        if !supported {
            return Err(BackendError::PresentUnsupported(queue_family));
        }

        self.sync = Some(FrameSync::new(&mut self.driver)?);

        let swapchain_settings =
            SwapchainSettings::query(&self.driver, pd, surface, settings.fallback_extent)?;
        let swapchain = self.swapchain.insert(Swapchain::create(
            &mut self.driver,
            surface,
            swapchain_settings,
            None,
        )?);

        self.commands = Some(ClearCommands::record(
            &mut self.driver,
            queue_family,
            &swapchain.images,
            settings.clear_color,
        )?);
        self.targets = Some(RenderTargets::new(&mut self.driver, swapchain)?);

        log::info!("Renderer ready");
        Ok(())
    }

    /// Acquire, submit the pre-recorded clear and present
    pub fn draw_frame(&mut self) -> Result<FrameOutcome, BackendError> {
        let (Some(swapchain), Some(sync), Some(commands)) =
            (&self.swapchain, &self.sync, &self.commands)
        else {
            return Err(BackendError::Driver {
                call: "vkAcquireNextImageKHR",
                result: vk::Result::ERROR_INITIALIZATION_FAILED,
            });
        };

        let frame = FrameResources {
            queue: self.queue,
            swapchain: swapchain.handle,
            sync,
            command_buffers: &commands.buffers,
        };
        let result = self.presenter.draw(&mut self.driver, &frame);
        if result.is_err() {
            log::error!("Frame failed in state {:?}", self.presenter.state());
        }
        result
    }

    pub fn physical_device(&self) -> Option<&PhysicalDeviceInfo> {
        self.physical_device.as_ref()
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    pub fn command_buffer_count(&self) -> usize {
        self.commands.as_ref().map_or(0, |commands| commands.buffers.len())
    }

    #[cfg(test)]
    pub fn targets(&self) -> Option<&RenderTargets> {
        self.targets.as_ref()
    }

    #[cfg(test)]
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: Driver> Drop for Renderer<D> {
    fn drop(&mut self) {
        if self.device.is_some() {
            if let Err(result) = self.driver.device_wait_idle() {
                log::warn!("vkDeviceWaitIdle failed during teardown: {:?}", result);
            }
        }

        // Reverse of creation
        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut self.driver);
        }
        if let Some(commands) = self.commands.take() {
            commands.destroy(&mut self.driver);
        }
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&mut self.driver);
        }
        if let Some(sync) = self.sync.take() {
            sync.destroy(&mut self.driver);
        }
        if let Some(surface) = self.surface.take() {
            self.driver.destroy_surface(surface);
        }
        if self.device.take().is_some() {
            self.driver.destroy_device();
        }
        if self.instance.take().is_some() {
            self.driver.destroy_instance();
        }

        log::info!("Renderer resources released");
    }
}
