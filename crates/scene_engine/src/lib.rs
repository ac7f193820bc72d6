//! # Scene Engine
//!
//! Scene graph, culling and multi-pass Vulkan renderer core for an
//! interactive 3D scene viewer.
//!
//! - **ecs**: generational entity store with capability records
//! - **scene**: materials, textures, bounds, frustum culling and dirty state
//! - **assets**: JSON scene descriptions, glTF import, image decoding
//! - **render**: scene synchronization and the shadow, skybox, forward, SSR
//!   and resolve passes
//! - **input**: window-wide or viewport-restricted input for camera control
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut window = Window::new(&config.window)?;
//!     let context = VulkanContext::new(&mut window, "viewer", config.render.validation)?;
//!
//!     let mut scene = Scene::new(&config.scene);
//!     let staged = load_scene_file(Path::new("resources/scenes/demo.json"), &scene)?;
//!     scene.replace_with(staged);
//!
//!     let mut pipeline = RenderPipeline::new(&context.gpu(), &config.render, &config.scene, context.swapchain()?)?;
//!     while !window.should_close() {
//!         window.poll_events();
//!         pipeline.render(context.swapchain()?, &mut scene)?;
//!     }
//!     drop(pipeline);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;

pub mod assets;
pub mod config;
pub mod ecs;
pub mod foundation;
pub mod input;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{load_scene_file, load_scene_str, LoadError},
        core::{Config, EngineConfig, RenderConfig, SceneConfig, WindowConfig},
        ecs::{
            components::{AmbientLight, DirectionalLight, MeshComponent, PointLight, Transform},
            Entity, EntityHandle,
        },
        foundation::{
            math::{Mat4, Quat, Vec3},
            time::{FrameClock, Stopwatch},
        },
        input::{DirectInput, InputSource, InputState, Key, MouseButton, ViewportInput},
        render::{
            backends::vulkan::{VulkanContext, Window},
            Camera, FrameStats, RenderError, RenderPipeline, RenderTarget,
        },
        scene::{Material, Scene, SceneStatus},
    };
}
