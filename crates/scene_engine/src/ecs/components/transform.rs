//! Transform capability
//!
//! Translation, rotation and non-uniform scale. Matrices are derived on
//! demand and never cached, so edits through `&mut Transform` are always
//! reflected the next time the object is synchronized.

use crate::foundation::math::{Mat3, Mat4, Quat, Vec3};

/// Spatial transform of an entity (Y-up, right-handed)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// World space translation
    pub translation: Vec3,

    /// World space rotation
    pub rotation: Quat,

    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Translation only
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Full TRS
    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Builder: set rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder: set per-axis scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix `T * R * S`
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Inverse-transpose of the upper 3x3 of the model matrix.
    ///
    /// For `R * S` this is `R * S^-1`. A zero scale axis collapses to zero
    /// instead of producing infinities.
    pub fn normal_matrix(&self) -> Mat3 {
        let inverse_scale = self.scale.map(|s| if s.abs() > f32::EPSILON { 1.0 / s } else { 0.0 });
        self.rotation.to_rotation_matrix().into_inner() * Mat3::from_diagonal(&inverse_scale)
    }

    /// Normal matrix padded to 4x4 for std430 upload
    pub fn normal_matrix_padded(&self) -> Mat4 {
        self.normal_matrix().to_homogeneous()
    }

    /// Compose `self` (parent) with `child`.
    ///
    /// Exact for uniform parent scale; with non-uniform parent scale and a
    /// rotated child the shear is dropped.
    pub fn combine(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation * self.scale.component_mul(&child.translation),
            rotation: self.rotation * child.rotation,
            scale: self.scale.component_mul(&child.scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::HALF_PI;
    use approx::assert_relative_eq;

    #[test]
    fn test_model_matrix_applies_scale_then_rotation_then_translation() {
        let transform = Transform::from_trs(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::y_axis(), HALF_PI),
            Vec3::new(2.0, 1.0, 1.0),
        );
        let point = transform.model_matrix().transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        // (1,0,0) -> scale (2,0,0) -> rotate about Y by 90 degrees (0,0,-2) -> translate
        assert_relative_eq!(point.coords, Vec3::new(10.0, 0.0, -2.0), epsilon = 1e-5);
    }

    #[test]
    fn test_normal_matrix_keeps_normals_perpendicular_under_nonuniform_scale() {
        let transform = Transform::identity().with_scale(Vec3::new(4.0, 1.0, 1.0));
        // Surface of a 45 degree slope in XY: tangent (1,1,0), normal (1,-1,0)
        let tangent = transform.model_matrix().transform_vector(&Vec3::new(1.0, 1.0, 0.0));
        let normal = transform.normal_matrix() * Vec3::new(1.0, -1.0, 0.0);
        assert_relative_eq!(tangent.dot(&normal), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_scale_normal_matrix_is_finite() {
        let transform = Transform::identity().with_scale(Vec3::new(0.0, 1.0, 1.0));
        assert!(transform.normal_matrix().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_combine_translates_child_in_parent_space() {
        let parent = Transform::from_trs(
            Vec3::new(0.0, 5.0, 0.0),
            Quat::identity(),
            Vec3::new(2.0, 2.0, 2.0),
        );
        let child = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let world = parent.combine(&child);
        assert_relative_eq!(world.translation, Vec3::new(2.0, 5.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(world.scale, Vec3::new(2.0, 2.0, 2.0), epsilon = 1e-6);
    }
}
