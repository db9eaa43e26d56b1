// Render targets
//
// Render pass, image views and framebuffers over the swapchain images. The
// clear loop itself only uses transfer commands, but the targets are built
// up front so a draw pass can be dropped in without touching setup order.

use ash::vk;

use super::commands::COLOR_SUBRESOURCE;
use super::driver::Driver;
use super::error::{BackendError, Check};
use super::swapchain::Swapchain;

/// Single color attachment that stays in PRESENT_SRC outside the pass
pub fn create_render_pass<D: Driver>(
    driver: &mut D,
    format: vk::Format,
) -> Result<vk::RenderPass, BackendError> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments)
        .build();

    let attachments = &[color_attachment];
    let subpasses = &[subpass];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses);

    driver
        .create_render_pass(&render_pass_info)
        .check("vkCreateRenderPass")
}

pub struct RenderTargets {
    pub render_pass: vk::RenderPass,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl RenderTargets {
    pub fn new<D: Driver>(driver: &mut D, swapchain: &Swapchain) -> Result<Self, BackendError> {
        let settings = &swapchain.settings;
        let render_pass = create_render_pass(driver, settings.surface_format.format)?;

        let mut targets = Self {
            render_pass,
            image_views: Vec::with_capacity(swapchain.images.len()),
            framebuffers: Vec::with_capacity(swapchain.images.len()),
        };

        if let Err(e) = targets.populate(driver, swapchain) {
            targets.destroy(driver);
            return Err(e);
        }

        Ok(targets)
    }

    fn populate<D: Driver>(&mut self, driver: &mut D, swapchain: &Swapchain) -> Result<(), BackendError> {
        let settings = &swapchain.settings;

        for &image in &swapchain.images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(settings.surface_format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(COLOR_SUBRESOURCE);

            let view = driver.create_image_view(&view_info).check("vkCreateImageView")?;
            self.image_views.push(view);
        }

        for &view in &self.image_views {
            let attachments = &[view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(self.render_pass)
                .attachments(attachments)
                .width(settings.extent.width)
                .height(settings.extent.height)
                .layers(1);

            let framebuffer = driver
                .create_framebuffer(&framebuffer_info)
                .check("vkCreateFramebuffer")?;
            self.framebuffers.push(framebuffer);
        }

        Ok(())
    }

    /// Release in reverse: framebuffers, views, then the pass they reference
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        for framebuffer in self.framebuffers.into_iter().rev() {
            driver.destroy_framebuffer(framebuffer);
        }
        for view in self.image_views.into_iter().rev() {
            driver.destroy_image_view(view);
        }
        driver.destroy_render_pass(self.render_pass);
    }
}
