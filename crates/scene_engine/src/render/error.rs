//! Render errors

use std::path::PathBuf;

use thiserror::Error;

use crate::render::backends::vulkan::VulkanError;

/// Errors raised while building or executing the render pipeline
#[derive(Error, Debug)]
pub enum RenderError {
    /// Vulkan API or resource failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// A compiled shader was not found in any search location
    #[error("shader not found: {0}")]
    ShaderNotFound(PathBuf),

    /// Scene data does not fit the GPU-side arrays
    #[error("{what} count {count} exceeds GPU capacity {capacity}")]
    CapacityExceeded {
        /// What overflowed
        what: &'static str,
        /// Requested count
        count: usize,
        /// Configured capacity
        capacity: usize,
    },

    /// A pass was asked to record before it was initialized
    #[error("pass '{0}' is not initialized")]
    PassNotInitialized(&'static str),
}

/// Result alias for render operations
pub type RenderResult<T> = Result<T, RenderError>;
