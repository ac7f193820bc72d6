//! Math types and helpers
//!
//! Thin aliases over `nalgebra` plus the projection helpers used by cameras,
//! shadow mapping and frustum extraction. Projections follow Vulkan
//! conventions: depth range `[0, 1]` and the Y/Z flip applied through
//! [`Mat4Ext::vulkan_coordinate_transform`].

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Unit quaternion used for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Unit direction from spherical angles.
    ///
    /// `phi` is the azimuth around +Y measured from +Z towards +X, `theta` the
    /// polar angle measured from +Y. `theta = 0` points straight up.
    pub fn spherical_direction(phi: f32, theta: f32) -> Vec3 {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let (sin_phi, cos_phi) = phi.sin_cos();
        Vec3::new(sin_theta * sin_phi, cos_theta, sin_theta * cos_phi)
    }

    /// Pick an up vector that is not parallel to `forward`
    pub fn stable_up(forward: &Vec3) -> Vec3 {
        if forward.normalize().y.abs() > 0.999 {
            Vec3::z()
        } else {
            Vec3::y()
        }
    }
}

/// Extension trait for Mat4 with projection and view helpers
pub trait Mat4Ext {
    /// Perspective projection with `[0, 1]` depth (vertical field of view in radians)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Orthographic projection with `[0, 1]` depth, expects the same
    /// post-[`Mat4Ext::vulkan_coordinate_transform`] view space as `perspective`
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix (camera looks down -Z in view space)
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Flip Y and Z to move from right-handed Y-up view space to Vulkan's
    /// Y-down, Z-forward clip conventions
    fn vulkan_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;
        result
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / (right - left);
        result[(0, 3)] = -(right + left) / (right - left);
        result[(1, 1)] = 2.0 / (top - bottom);
        result[(1, 3)] = -(top + bottom) / (top - bottom);
        result[(2, 2)] = 1.0 / (far - near);
        result[(2, 3)] = -near / (far - near);
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new_translation(&-eye);
        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, -1.0, 0.0, 0.0,
            0.0, 0.0, -1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_maps_near_and_far_to_unit_depth() {
        let projection = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 100.0);
        let near = projection * Vec4::new(0.0, 0.0, 0.1, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, 100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-6);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_volume() {
        let projection = Mat4::orthographic(-2.0, 2.0, -1.0, 1.0, 1.0, 11.0);
        let corner = projection * Vec4::new(2.0, -1.0, 11.0, 1.0);
        assert_relative_eq!(corner.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(corner.y, -1.0, epsilon = 1e-6);
        assert_relative_eq!(corner.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_spherical_direction_axes() {
        assert_relative_eq!(utils::spherical_direction(0.0, 0.0), Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(
            utils::spherical_direction(0.0, constants::HALF_PI),
            Vec3::z(),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            utils::spherical_direction(constants::HALF_PI, constants::HALF_PI),
            Vec3::x(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let eye = view.transform_point(&Point3::new(0.0, 0.0, 5.0));
        let target = view.transform_point(&Point3::origin());
        assert_relative_eq!(eye.coords, Vec3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(target.z, -5.0, epsilon = 1e-6);
    }
}
