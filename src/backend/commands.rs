// Command recording
//
// One primary command buffer per swapchain image, recorded once at setup and
// resubmitted every frame. Each buffer moves its image into TRANSFER_DST,
// clears it, and hands it back in PRESENT_SRC.

use ash::vk;

use super::driver::Driver;
use super::error::{BackendError, Check};

/// The single color mip/layer of a swapchain image
pub const COLOR_SUBRESOURCE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Stage the acquire semaphore is waited on; the first barrier chains off it
pub const CLEAR_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::TRANSFER;

pub struct ClearCommands {
    pub pool: vk::CommandPool,
    /// Indexed by swapchain image
    pub buffers: Vec<vk::CommandBuffer>,
}

impl ClearCommands {
    /// Create the pool, allocate one buffer per image and record the clears.
    ///
    /// On failure everything allocated so far is released before returning.
    pub fn record<D: Driver>(
        driver: &mut D,
        queue_family: u32,
        images: &[vk::Image],
        clear_color: [f32; 4],
    ) -> Result<Self, BackendError> {
        let pool = driver
            .create_command_pool(queue_family)
            .check("vkCreateCommandPool")?;

        let mut commands = Self {
            pool,
            buffers: Vec::new(),
        };

        let result = commands.allocate_and_record(driver, images, clear_color);
        match result {
            Ok(()) => {
                log::info!("Created {} pre-recorded command buffers", commands.buffers.len());
                Ok(commands)
            }
            Err(e) => {
                commands.destroy(driver);
                Err(e)
            }
        }
    }

    fn allocate_and_record<D: Driver>(
        &mut self,
        driver: &mut D,
        images: &[vk::Image],
        clear_color: [f32; 4],
    ) -> Result<(), BackendError> {
        self.buffers = driver
            .allocate_command_buffers(self.pool, images.len() as u32)
            .check("vkAllocateCommandBuffers")?;

        let clear_color = vk::ClearColorValue {
            float32: clear_color,
        };

        for (&cmd, &image) in self.buffers.iter().zip(images) {
            record_clear(driver, cmd, image, &clear_color)?;
        }
        Ok(())
    }

    pub fn destroy<D: Driver>(self, driver: &mut D) {
        if !self.buffers.is_empty() {
            driver.free_command_buffers(self.pool, &self.buffers);
        }
        driver.destroy_command_pool(self.pool);
    }
}

fn record_clear<D: Driver>(
    driver: &mut D,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    clear_color: &vk::ClearColorValue,
) -> Result<(), BackendError> {
    driver
        .begin_command_buffer(cmd, vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)
        .check("vkBeginCommandBuffer")?;

    // Contents are overwritten, so the previous layout does not matter
    let to_transfer = vk::ImageMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::MEMORY_READ)
        .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_SUBRESOURCE)
        .build();

    driver.cmd_pipeline_barrier(cmd, CLEAR_STAGE, vk::PipelineStageFlags::TRANSFER, &to_transfer);

    driver.cmd_clear_color_image(cmd, image, clear_color, COLOR_SUBRESOURCE);

    let to_present = vk::ImageMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ)
        .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_SUBRESOURCE)
        .build();

    driver.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        &to_present,
    );

    driver.end_command_buffer(cmd).check("vkEndCommandBuffer")
}
