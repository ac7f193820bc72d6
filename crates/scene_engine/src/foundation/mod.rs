//! Foundation module: math, logging and timing utilities shared by the engine

pub mod logging;
pub mod math;
pub mod time;
