//! Presentation and synchronization state

pub mod swapchain;
pub mod sync;
pub mod timing;

pub use swapchain::{AcquiredImage, Swapchain};
pub use sync::{Fence, FrameSync, Semaphore};
pub use timing::TimestampQueries;
