//! Instance, device, surface and window setup

pub mod context;
pub mod window;

pub use context::*;
pub use window::*;
