//! Recording: shaders, pipelines, render passes and commands

pub mod commands;
pub mod render_pass;
pub mod shader;

pub use commands::*;
pub use render_pass::*;
pub use shader::*;
