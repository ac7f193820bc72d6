//! Camera and mesh primitives used by the scene and the passes

pub mod camera;
pub mod mesh;

pub use camera::{Camera, CameraControls, Navigation, Projection};
pub use mesh::{GeometryPool, MeshRange, Primitive, Vertex};
