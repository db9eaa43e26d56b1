// Backend module - Vulkan abstraction layer
//
// Design: every driver call goes through the `Driver` trait so the setup,
// recording and presentation logic can run against a recording mock.
// Creation helpers return owned handle groups; the renderer decides when
// each group is destroyed.

pub mod capabilities;
pub mod commands;
pub mod device;
pub mod driver;
pub mod error;
pub mod frame;
pub mod loader;
pub mod platform;
pub mod swapchain;
pub mod sync;
pub mod targets;
pub mod vulkan;

#[cfg(test)]
pub mod mock;

pub use driver::Driver;
pub use error::BackendError;
pub use frame::FrameOutcome;
pub use platform::SurfaceTarget;
pub use vulkan::AshDriver;
