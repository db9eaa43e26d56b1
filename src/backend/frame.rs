// Frame loop
//
// acquire → submit → present, one frame at a time on a single thread. The
// two semaphores in FrameSync order the GPU side; the host never blocks on a
// fence. An out-of-date or suboptimal swapchain skips the frame, nothing is
// rebuilt.

use ash::vk;
use std::fmt;

use super::commands::CLEAR_STAGE;
use super::driver::{Driver, Submission};
use super::error::BackendError;
use super::sync::FrameSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    ImageAcquired { image_index: u32 },
    Submitted { image_index: u32 },
    Presented { image_index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Acquire,
    Present,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStage::Acquire => f.write_str("acquire"),
            FrameStage::Present => f.write_str("present"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { image_index: u32 },
    /// The swapchain no longer matches the surface; nothing more was issued
    /// for this frame
    Skipped { stage: FrameStage, reason: vk::Result },
}

/// Everything a frame needs from the renderer, borrowed for one draw
pub struct FrameResources<'a> {
    pub queue: vk::Queue,
    pub swapchain: vk::SwapchainKHR,
    pub sync: &'a FrameSync,
    /// Pre-recorded, indexed by swapchain image
    pub command_buffers: &'a [vk::CommandBuffer],
}

#[derive(Debug)]
pub struct FramePresenter {
    state: FrameState,
}

impl Default for FramePresenter {
    fn default() -> Self {
        Self {
            state: FrameState::Idle,
        }
    }
}

impl FramePresenter {
    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn draw<D: Driver>(
        &mut self,
        driver: &mut D,
        frame: &FrameResources<'_>,
    ) -> Result<FrameOutcome, BackendError> {
        self.state = FrameState::Idle;

        let image_index = match driver.acquire_next_image(
            frame.swapchain,
            u64::MAX,
            frame.sync.image_available,
        ) {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    log::trace!("Swapchain suboptimal on acquire, continuing");
                }
                image_index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                return Ok(self.skip(FrameStage::Acquire, vk::Result::ERROR_OUT_OF_DATE_KHR));
            }
            Err(result) => {
                return Err(BackendError::Driver {
                    call: "vkAcquireNextImageKHR",
                    result,
                })
            }
        };
        self.state = FrameState::ImageAcquired { image_index };

        let command_buffer = frame
            .command_buffers
            .get(image_index as usize)
            .copied()
            .ok_or(BackendError::Driver {
                call: "vkAcquireNextImageKHR",
                result: vk::Result::ERROR_UNKNOWN,
            })?;

        let submission = Submission {
            command_buffer,
            wait: frame.sync.image_available,
            wait_stage: CLEAR_STAGE,
            signal: frame.sync.render_finished,
        };
        driver
            .queue_submit(frame.queue, &submission)
            .map_err(|result| BackendError::Driver {
                call: "vkQueueSubmit",
                result,
            })?;
        self.state = FrameState::Submitted { image_index };

        match driver.queue_present(
            frame.queue,
            frame.swapchain,
            image_index,
            frame.sync.render_finished,
        ) {
            Ok(false) => {
                self.state = FrameState::Presented { image_index };
                Ok(FrameOutcome::Presented { image_index })
            }
            Ok(true) => Ok(self.skip(FrameStage::Present, vk::Result::SUBOPTIMAL_KHR)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                Ok(self.skip(FrameStage::Present, vk::Result::ERROR_OUT_OF_DATE_KHR))
            }
            Err(result) => Err(BackendError::Driver {
                call: "vkQueuePresentKHR",
                result,
            }),
        }
    }

    fn skip(&mut self, stage: FrameStage, reason: vk::Result) -> FrameOutcome {
        log::debug!("Skipping frame at {stage}: {reason:?}");
        self.state = FrameState::Idle;
        FrameOutcome::Skipped { stage, reason }
    }
}
