//! Capability record types

pub mod camera;
pub mod lighting;
pub mod mesh;
pub mod transform;

pub use camera::CameraComponent;
pub use lighting::{AmbientLight, DirectionalLight, PointLight, ShadowCullMode, ShadowSettings};
pub use mesh::{GeometrySource, MeshComponent};
pub use transform::Transform;
