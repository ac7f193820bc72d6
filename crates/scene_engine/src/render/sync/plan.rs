//! Device-free synchronization decisions
//!
//! [`SyncPlan::new`] turns the scene's dirty state into the list of GPU
//! operations the synchronizer records this frame. Keeping it pure lets
//! the zero/upload/rebind rules be tested without a device.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::core::SceneConfig;
use crate::render::error::{RenderError, RenderResult};
use crate::scene::SceneStatus;

/// Scene-side state consumed by one sync
#[derive(Debug, Clone, Copy)]
pub struct SyncInput<'a> {
    /// Flags taken from the scene this frame
    pub status: SceneStatus,
    /// Nothing has been synchronized yet
    pub first_frame: bool,
    /// Object indices whose data changed
    pub updated: &'a BTreeSet<u32>,
    /// Entities in the scene
    pub object_count: usize,
    /// 2-D textures in the scene
    pub textures_2d: usize,
    /// Cube textures in the scene
    pub textures_cube: usize,
    /// 2-D textures already on the GPU
    pub uploaded_2d: usize,
    /// Cube textures already on the GPU
    pub uploaded_cube: usize,
}

/// GPU operations for one frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncPlan {
    /// Fill the object and scene buffers with zeros
    pub zero_buffers: bool,
    /// Destroy every uploaded texture image
    pub destroy_textures: bool,
    /// 2-D textures to upload, by array index
    pub upload_2d: Range<usize>,
    /// Cube textures to upload, by array index
    pub upload_cube: Range<usize>,
    /// Replace both texture arrays in every frame slot's descriptor set
    pub rebind_textures: bool,
    /// Object records to rewrite, ascending
    pub objects: Vec<u32>,
}

impl SyncPlan {
    /// Decide this frame's operations, failing when the scene outgrew the
    /// GPU arrays
    pub fn new(input: &SyncInput<'_>, limits: &SceneConfig) -> RenderResult<Self> {
        check_capacity("object", input.object_count, limits.max_objects)?;
        check_capacity("2-D texture", input.textures_2d, limits.max_textures_2d)?;
        check_capacity("cube texture", input.textures_cube, limits.max_textures_cube)?;

        let cleared = input.status.contains(SceneStatus::CLEARED);
        let (uploaded_2d, uploaded_cube) = if cleared {
            (0, 0)
        } else {
            (input.uploaded_2d, input.uploaded_cube)
        };

        let upload_2d = uploaded_2d.min(input.textures_2d)..input.textures_2d;
        let upload_cube = uploaded_cube.min(input.textures_cube)..input.textures_cube;

        let rebind_textures = input.first_frame
            || cleared
            || input.status.textures_changed()
            || !upload_2d.is_empty()
            || !upload_cube.is_empty();

        Ok(Self {
            zero_buffers: cleared,
            destroy_textures: cleared,
            upload_2d,
            upload_cube,
            rebind_textures,
            objects: input
                .updated
                .iter()
                .copied()
                .filter(|&index| (index as usize) < input.object_count)
                .collect(),
        })
    }

    /// Nothing to record besides the scene uniform
    pub fn is_idle(&self) -> bool {
        !self.zero_buffers
            && !self.destroy_textures
            && self.upload_2d.is_empty()
            && self.upload_cube.is_empty()
            && !self.rebind_textures
            && self.objects.is_empty()
    }
}

fn check_capacity(what: &'static str, count: usize, capacity: usize) -> RenderResult<()> {
    if count > capacity {
        return Err(RenderError::CapacityExceeded { what, count, capacity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SceneConfig {
        SceneConfig {
            max_entities: 16,
            max_objects: 4,
            max_textures_2d: 3,
            max_textures_cube: 1,
        }
    }

    fn input(status: SceneStatus, updated: &BTreeSet<u32>) -> SyncInput<'_> {
        SyncInput {
            status,
            first_frame: false,
            updated,
            object_count: 3,
            textures_2d: 2,
            textures_cube: 1,
            uploaded_2d: 2,
            uploaded_cube: 1,
        }
    }

    #[test]
    fn test_clear_zeroes_and_reuploads_everything() {
        let updated = BTreeSet::from([0, 1, 2]);
        let plan = SyncPlan::new(&input(SceneStatus::CLEARED, &updated), &limits()).unwrap();

        assert!(plan.zero_buffers);
        assert!(plan.destroy_textures);
        assert_eq!(plan.upload_2d, 0..2);
        assert_eq!(plan.upload_cube, 0..1);
        assert!(plan.rebind_textures);
        assert_eq!(plan.objects, vec![0, 1, 2]);
    }

    #[test]
    fn test_texture_add_uploads_new_and_rebinds() {
        let updated = BTreeSet::new();
        let mut sync = input(SceneStatus::TEXTURE_2D_ADDED, &updated);
        sync.uploaded_2d = 1;
        let plan = SyncPlan::new(&sync, &limits()).unwrap();

        assert!(!plan.zero_buffers);
        assert_eq!(plan.upload_2d, 1..2);
        assert!(plan.upload_cube.is_empty());
        assert!(plan.rebind_textures);
    }

    #[test]
    fn test_first_frame_rebinds_placeholders() {
        let updated = BTreeSet::new();
        let mut sync = input(SceneStatus::empty(), &updated);
        sync.first_frame = true;
        let plan = SyncPlan::new(&sync, &limits()).unwrap();

        assert!(plan.rebind_textures);
        assert!(plan.upload_2d.is_empty());
    }

    #[test]
    fn test_only_updated_objects_are_rewritten() {
        let updated = BTreeSet::from([2, 0]);
        let plan = SyncPlan::new(&input(SceneStatus::empty(), &updated), &limits()).unwrap();

        assert_eq!(plan.objects, vec![0, 2]);
        assert!(!plan.rebind_textures);
        assert!(!plan.is_idle());
    }

    #[test]
    fn test_steady_state_is_idle() {
        let updated = BTreeSet::new();
        let plan = SyncPlan::new(&input(SceneStatus::empty(), &updated), &limits()).unwrap();
        assert!(plan.is_idle());
    }

    #[test]
    fn test_object_overflow_fails_fast() {
        let updated = BTreeSet::new();
        let mut sync = input(SceneStatus::OBJECT_ADDED, &updated);
        sync.object_count = 5;

        match SyncPlan::new(&sync, &limits()) {
            Err(RenderError::CapacityExceeded { what, count, capacity }) => {
                assert_eq!(what, "object");
                assert_eq!(count, 5);
                assert_eq!(capacity, 4);
            }
            other => panic!("expected capacity error, got {:?}", other),
        }
    }

    #[test]
    fn test_texture_overflow_fails_fast() {
        let updated = BTreeSet::new();
        let mut sync = input(SceneStatus::TEXTURE_CUBE_ADDED, &updated);
        sync.textures_cube = 2;
        assert!(matches!(
            SyncPlan::new(&sync, &limits()),
            Err(RenderError::CapacityExceeded { what: "cube texture", .. })
        ));
    }
}
