// Synchronization primitives
//
// One semaphore pair shared by every frame. The host never waits on either;
// they only order acquire → submit → present on the GPU side.

use ash::vk;

use super::driver::Driver;
use super::error::{BackendError, Check};

pub struct FrameSync {
    /// Signalled by acquire, waited on by the submission
    pub image_available: vk::Semaphore,
    /// Signalled by the submission, waited on by present
    pub render_finished: vk::Semaphore,
}

impl FrameSync {
    pub fn new<D: Driver>(driver: &mut D) -> Result<Self, BackendError> {
        let image_available = driver.create_semaphore().check("vkCreateSemaphore")?;
        let render_finished = match driver.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(result) => {
                driver.destroy_semaphore(image_available);
                return Err(BackendError::Driver {
                    call: "vkCreateSemaphore",
                    result,
                });
            }
        };

        Ok(Self {
            image_available,
            render_finished,
        })
    }

    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_semaphore(self.image_available);
        driver.destroy_semaphore(self.render_finished);
    }
}
