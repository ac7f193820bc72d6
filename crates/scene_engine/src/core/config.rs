//! # Engine Configuration
//!
//! All tunables of the renderer core in one serializable tree. Every section
//! carries `#[serde(default)]` so a config file only needs the keys it changes.
//!
//! ```toml
//! log_filter = "info"
//!
//! [scene]
//! max_entities = 4096
//!
//! [render]
//! shadow_map_resolution = 2048
//! ssr_enabled = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::config::{Config, ConfigError};

/// Directories searched for compiled SPIR-V after the configured one
const SHADER_SEARCH_DIRS: [&str; 4] = ["target/shaders", "shaders", "resources/shaders", "../target/shaders"];

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial framebuffer width in pixels
    pub width: u32,
    /// Initial framebuffer height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Scene Viewer".to_string(),
            width: 1600,
            height: 900,
        }
    }
}

/// Capacity ceilings fixed when a scene is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Hard ceiling on entities per scene generation
    pub max_entities: usize,
    /// Slots in the GPU-resident per-object buffer
    pub max_objects: usize,
    /// Size of the 2-D texture descriptor array
    pub max_textures_2d: usize,
    /// Size of the cube texture descriptor array
    pub max_textures_cube: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_entities: 4096,
            max_objects: 4096,
            max_textures_2d: 128,
            max_textures_cube: 8,
        }
    }
}

/// Render pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Number of frame slots the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Square resolution of the directional shadow map
    pub shadow_map_resolution: u32,
    /// Reject meshes outside the camera frustum
    pub frustum_culling: bool,
    /// Order visible meshes front to back
    pub distance_sort: bool,
    /// Run the screen-space reflection pass
    pub ssr_enabled: bool,
    /// Apply FXAA in the resolve pass (the pass itself always runs)
    pub anti_aliasing: bool,
    /// Enable Vulkan validation layers (debug builds only)
    pub validation: bool,
    /// Directory holding compiled `*.spv` shaders
    pub shader_dir: PathBuf,
    /// Background color used when no skybox is drawn
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            shadow_map_resolution: 2048,
            frustum_culling: true,
            distance_sort: true,
            ssr_enabled: true,
            anti_aliasing: true,
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("target/shaders"),
            clear_color: [0.05, 0.05, 0.08, 1.0],
        }
    }
}

impl RenderConfig {
    /// Resolve a compiled shader by file name.
    ///
    /// Looks in `shader_dir` first, then in the usual build output locations
    /// so the viewer can run from the workspace root or a crate directory.
    pub fn resolve_shader(&self, file_name: &str) -> PathBuf {
        let configured = self.shader_dir.join(file_name);
        if configured.exists() {
            return configured;
        }

        SHADER_SEARCH_DIRS
            .iter()
            .map(|dir| Path::new(dir).join(file_name))
            .find(|candidate| candidate.exists())
            .unwrap_or(configured)
    }
}

/// # Engine Configuration
///
/// Top-level configuration consumed by the viewer and the render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default `env_logger` filter, overridden by `RUST_LOG`
    pub log_filter: String,
    /// Window parameters
    pub window: WindowConfig,
    /// Scene capacities
    pub scene: SceneConfig,
    /// Pipeline settings
    pub render: RenderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            window: WindowConfig::default(),
            scene: SceneConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the default log filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Set the entity ceiling
    pub fn with_max_entities(mut self, max_entities: usize) -> Self {
        self.scene.max_entities = max_entities;
        self
    }

    /// Set the GPU object buffer capacity
    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.scene.max_objects = max_objects;
        self
    }

    /// Set the shadow map resolution
    pub fn with_shadow_map_resolution(mut self, resolution: u32) -> Self {
        self.render.shadow_map_resolution = resolution;
        self
    }

    /// Enable or disable screen-space reflections
    pub fn with_ssr(mut self, enabled: bool) -> Self {
        self.render.ssr_enabled = enabled;
        self
    }

    /// Configure culling and sorting
    pub fn with_culling(mut self, frustum_culling: bool, distance_sort: bool) -> Self {
        self.render.frustum_culling = frustum_culling;
        self.render.distance_sort = distance_sort;
        self
    }

    /// Set the compiled shader directory
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.render.shader_dir = dir.into();
        self
    }

    /// Check ranges that would otherwise fail deep inside Vulkan calls
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Invalid(reason.to_string()));

        if self.window.width == 0 || self.window.height == 0 {
            return invalid("window size must be non-zero");
        }
        if self.scene.max_entities == 0 {
            return invalid("max_entities must be at least 1");
        }
        if self.scene.max_objects < self.scene.max_entities {
            return invalid("max_objects must be at least max_entities");
        }
        if self.scene.max_textures_2d == 0 || self.scene.max_textures_cube == 0 {
            return invalid("texture arrays need at least one slot for the placeholder");
        }
        if !(1..=4).contains(&self.render.frames_in_flight) {
            return invalid("frames_in_flight must be between 1 and 4");
        }
        if !self.render.shadow_map_resolution.is_power_of_two() {
            return invalid("shadow_map_resolution must be a power of two");
        }
        Ok(())
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_object_capacity_below_entity_capacity_is_rejected() {
        let config = EngineConfig::default().with_max_entities(100).with_max_objects(10);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            log_filter = "debug"

            [render]
            ssr_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.log_filter, "debug");
        assert!(!config.render.ssr_enabled);
        assert_eq!(config.render.shadow_map_resolution, 2048);
        assert_eq!(config.scene, SceneConfig::default());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = EngineConfig::default().with_shadow_map_resolution(1024).with_culling(false, true);
        let text = ron::ser::to_string(&config).unwrap();
        let parsed: EngineConfig = ron::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = EngineConfig::load_from_file("engine.yaml");
        assert!(result.is_err());
    }
}
