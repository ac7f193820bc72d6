//! # Rendering
//!
//! Vulkan renderer for a [`Scene`](crate::scene::Scene):
//!
//! - **backends**: RAII wrappers over `ash`
//! - **sync**: scene to GPU buffer and texture synchronization
//! - **graph**: pass resource declarations and layout tracking
//! - **passes**: shadow, skybox, forward, SSR and resolve passes
//! - **pipeline**: per-frame orchestration
//! - **primitives**: camera, vertex format and built-in meshes

pub mod backends;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod passes;
pub mod pipeline;
pub mod primitives;
pub mod sync;

pub use error::{RenderError, RenderResult};
pub use graph::{ResourceAccess, ResourceId, ResourceState, ResourceTracker, Transition};
pub use passes::{PassSlot, PassState, RenderPassNode};
pub use pipeline::{FrameStats, PassTiming, RenderPipeline, RenderTarget};
pub use primitives::{Camera, CameraControls, Navigation, Projection};
