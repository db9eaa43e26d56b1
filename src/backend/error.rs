// Backend errors
//
// Every failure during bring-up or the frame loop ends up here. Nothing is
// retried: the caller tears down what exists and the process exits.

use ash::prelude::VkResult;
use ash::vk;
use std::fmt;
use thiserror::Error;

/// Which extension list a capability check ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Instance,
    Device,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::Instance => f.write_str("instance"),
            ExtensionKind::Device => f.write_str("device"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Unsupported window system: {0}")]
    UnsupportedPlatform(String),

    #[error("Missing required {kind} extensions: {}", .names.join(", "))]
    MissingExtensions {
        kind: ExtensionKind,
        names: Vec<String>,
    },

    #[error("Extension entry point {0} could not be loaded")]
    MissingFunction(&'static str),

    #[error("No Vulkan-capable GPU found")]
    NoPhysicalDevice,

    #[error("No queue family with graphics support")]
    NoGraphicsQueue,

    #[error("Queue family {0} cannot present to the window surface")]
    PresentUnsupported(u32),

    #[error("Surface reports no formats")]
    NoSurfaceFormat,

    #[error("Surface does not support TRANSFER_DST image usage")]
    UnsupportedUsage,

    #[error("Surface supports neither MAILBOX nor FIFO present mode")]
    NoPresentMode,

    #[error("{call} failed: {result:?} ({result})")]
    Driver {
        call: &'static str,
        result: vk::Result,
    },
}

/// Tag a raw driver result with the entry point that produced it
pub trait Check<T> {
    fn check(self, call: &'static str) -> Result<T, BackendError>;
}

impl<T> Check<T> for VkResult<T> {
    fn check(self, call: &'static str) -> Result<T, BackendError> {
        self.map_err(|result| BackendError::Driver { call, result })
    }
}
