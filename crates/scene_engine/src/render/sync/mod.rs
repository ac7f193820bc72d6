//! CPU to GPU scene synchronization

pub mod object_data;
pub mod plan;
pub mod scene_uniform;
pub mod synchronizer;

pub use object_data::{ObjectData, NO_TEXTURE};
pub use plan::{SyncInput, SyncPlan};
pub use scene_uniform::{PointLightData, SceneUniform, MAX_POINT_LIGHTS};
pub use synchronizer::SceneSynchronizer;
