//! Scene data and the CPU half of rendering
//!
//! ```text
//! Scene (entities, materials, textures, dirty state)
//!      |
//! bounds + frustum -> Culler -> DrawList
//!      |
//! render::sync consumes SceneStatus / updated indices
//! ```

pub mod animation;
pub mod bounds;
pub mod culler;
pub mod frustum;
pub mod material;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod status;
pub mod texture;

pub use animation::{AnimationChannel, AnimationClip, Interpolation, Keyframes};
pub use bounds::{compute_local_aabb, merged_scene_aabb, world_aabb, Aabb};
pub use culler::{CullSettings, Culler, DrawItem, DrawList};
pub use frustum::{Frustum, Plane};
pub use material::{Material, MaterialId, TextureSlot};
pub use scene::{Scene, SceneError, SceneResult};
pub use status::SceneStatus;
pub use texture::{ImageData, Texture, TextureId, TextureKind};
