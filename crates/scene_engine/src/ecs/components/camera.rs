//! Camera capability

use crate::render::primitives::camera::Camera;

/// Attaches a [`Camera`] to an entity
#[derive(Debug, Clone)]
pub struct CameraComponent {
    /// The camera itself
    pub camera: Camera,
}

impl CameraComponent {
    /// Wrap a camera
    pub fn new(camera: Camera) -> Self {
        Self { camera }
    }
}
