//! Scene dirty-state flags

use bitflags::bitflags;

bitflags! {
    /// What changed in a scene since the synchronizer last consumed it
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneStatus: u8 {
        /// The scene was cleared or replaced; all GPU data is stale
        const CLEARED = 1 << 0;
        /// At least one entity was appended
        const OBJECT_ADDED = 1 << 1;
        /// At least one 2-D texture was appended
        const TEXTURE_2D_ADDED = 1 << 2;
        /// At least one cube texture was appended
        const TEXTURE_CUBE_ADDED = 1 << 3;
    }
}

impl SceneStatus {
    /// Any texture array needs its bindings replaced
    pub fn textures_changed(self) -> bool {
        self.intersects(Self::TEXTURE_2D_ADDED | Self::TEXTURE_CUBE_ADDED)
    }
}
