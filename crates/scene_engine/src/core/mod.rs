//! # Core Engine Module
//!
//! Engine-wide configuration shared by the scene, asset and render layers.

pub mod config;

pub use config::{Config, ConfigError, EngineConfig, RenderConfig, SceneConfig, WindowConfig};
