//! Interactive scene viewer
//!
//! ```text
//! scene_viewer [config.toml|config.ron] [scene.json]
//! ```
//!
//! Controls: drag with the left mouse button to orbit, scroll to zoom,
//! WASD/QE to fly a first-person camera. `R` reloads the scene file, `F5`
//! rebuilds the pipeline from the shaders on disk, `Tab` restricts camera
//! input to the right half of the window.

use std::path::{Path, PathBuf};

use glfw::WindowEvent;
use thiserror::Error;

use scene_engine::config::ConfigError;
use scene_engine::foundation::logging;
use scene_engine::input::Viewport;
use scene_engine::prelude::*;
use scene_engine::render::backends::vulkan::{VulkanError, WindowError};

const DEFAULT_SCENE: &str = "resources/scenes/demo.json";

/// Seconds between frame statistics lines
const STATS_INTERVAL: f32 = 2.0;

#[derive(Error, Debug)]
enum ViewerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to load scene {path}: {source}")]
    Scene {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
}

type ViewerResult<T> = Result<T, ViewerError>;

/// Which input provider drives the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Window,
    Viewport,
}

impl InputMode {
    fn toggled(self) -> Self {
        match self {
            Self::Window => Self::Viewport,
            Self::Viewport => Self::Window,
        }
    }
}

// Field order is drop order: the pipeline goes before the context, the
// window last.
struct SceneViewer {
    pipeline: RenderPipeline,
    scene: Scene,
    context: VulkanContext,
    window: Window,
    input: InputState,
    input_mode: InputMode,
    clock: FrameClock,
    scene_path: PathBuf,
    framebuffer_size: (u32, u32),
    stats_elapsed: f32,
}

impl SceneViewer {
    fn new(config: &EngineConfig, scene_path: PathBuf) -> ViewerResult<Self> {
        let mut window = Window::new(&config.window)?;
        let context = VulkanContext::new(&mut window, &config.window.title, config.render.validation)?;

        let mut scene = Scene::new(&config.scene);
        let staged = load_scene(&scene_path, &scene)?;
        scene.replace_with(staged);

        let pipeline = RenderPipeline::new(&context.gpu(), &config.render, &config.scene, context.swapchain()?)?;
        let framebuffer_size = window.framebuffer_size();

        Ok(Self {
            pipeline,
            scene,
            context,
            window,
            input: InputState::new(),
            input_mode: InputMode::Window,
            clock: FrameClock::new(),
            scene_path,
            framebuffer_size,
            stats_elapsed: 0.0,
        })
    }

    fn run(&mut self) -> ViewerResult<()> {
        log::info!("Viewing {}", self.scene_path.display());

        while !self.window.should_close() {
            self.window.poll_events();
            let mut resized = false;
            for (_, event) in self.window.flush_events() {
                if let WindowEvent::FramebufferSize(width, height) = &event {
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    resized = true;
                }
                self.input.handle_event(&event);
            }

            let delta_time = self.clock.tick();
            self.handle_commands()?;
            self.update_camera(delta_time);

            let size = self.window.framebuffer_size();
            if size.0 == 0 || size.1 == 0 {
                // Minimized
                self.input.end_frame();
                self.window.wait_events();
                continue;
            }
            if resized || size != self.framebuffer_size {
                self.rebuild_target()?;
            }

            let stats = self.pipeline.render(self.context.swapchain()?, &mut self.scene)?;
            if stats.target_stale {
                self.rebuild_target()?;
            } else if stats.rendered {
                self.report(&stats, delta_time);
            }

            self.input.end_frame();
        }

        log::info!("Viewer closed after {} frames", self.clock.frame_count());
        Ok(())
    }

    fn handle_commands(&mut self) -> ViewerResult<()> {
        if self.input.was_pressed(Key::Escape) {
            self.window.set_should_close(true);
        }
        if self.input.was_pressed(Key::R) {
            self.reload_scene()?;
        }
        if self.input.was_pressed(Key::F5) {
            log::info!("Recompiling render pipeline");
            self.pipeline.recompile(self.context.swapchain()?)?;
        }
        if self.input.was_pressed(Key::Tab) {
            self.input_mode = self.input_mode.toggled();
            log::info!("Camera input: {:?}", self.input_mode);
        }
        Ok(())
    }

    /// Stage the file against the live scene and swap it in only when the
    /// whole load succeeded
    fn reload_scene(&mut self) -> ViewerResult<()> {
        match load_scene(&self.scene_path, &self.scene) {
            Ok(staged) => {
                self.context.gpu().wait_idle()?;
                self.scene.replace_with(staged);
                log::info!("Reloaded {}", self.scene_path.display());
            }
            Err(error) => log::warn!("{}; keeping the current scene", error),
        }
        Ok(())
    }

    fn update_camera(&mut self, delta_time: f32) {
        let (width, height) = self.window.framebuffer_size();
        let Some(camera) = self.scene.camera_mut() else {
            return;
        };
        match self.input_mode {
            InputMode::Window => camera.handle_input(&DirectInput::new(&self.input), delta_time),
            InputMode::Viewport => {
                // Right half of the window
                let viewport = Viewport {
                    x: width as f32 * 0.5,
                    y: 0.0,
                    width: width as f32 * 0.5,
                    height: height as f32,
                };
                camera.handle_input(&ViewportInput::new(&self.input, viewport), delta_time);
            }
        }
    }

    fn rebuild_target(&mut self) -> ViewerResult<()> {
        self.context.recreate_swapchain(&self.window)?;
        self.pipeline.resize(self.context.swapchain()?)?;
        self.framebuffer_size = self.window.framebuffer_size();
        Ok(())
    }

    fn report(&mut self, stats: &FrameStats, delta_time: f32) {
        self.stats_elapsed += delta_time;
        if self.stats_elapsed < STATS_INTERVAL {
            return;
        }
        self.stats_elapsed = 0.0;

        let passes = stats
            .pass_timings
            .iter()
            .map(|timing| format!("{} {:.2}ms", timing.slot.name(), timing.ms))
            .collect::<Vec<_>>()
            .join(", ");
        log::info!(
            "{:.1} fps, {}/{} meshes visible, gpu {:.2}ms [{}]",
            1.0 / delta_time.max(f32::EPSILON),
            stats.visible,
            stats.meshes,
            stats.total_ms(),
            passes
        );
    }
}

fn load_scene(path: &Path, scene: &Scene) -> ViewerResult<Scene> {
    load_scene_file(path, scene).map_err(|source| ViewerError::Scene {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(path: Option<&str>) -> ViewerResult<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(args.first().map(String::as_str))?;

    logging::init_with_filter(&config.log_filter);

    let scene_path = args.get(1).map_or_else(|| PathBuf::from(DEFAULT_SCENE), PathBuf::from);
    let mut viewer = SceneViewer::new(&config, scene_path)?;
    viewer.run()?;
    Ok(())
}
