//! View frustum planes and the AABB visibility test

use crate::foundation::math::{Mat4, Vec3, Vec4};

use super::bounds::Aabb;

/// Plane `normal . p + distance = 0`; the positive side is "inside"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the frustum
    pub normal: Vec3,
    /// Offset along the normal
    pub distance: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::zeros(),
            distance: 0.0,
        }
    }
}

impl Plane {
    /// Plane from raw `(a, b, c, d)` coefficients, normalized so signed
    /// distances are in world units
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.xyz();
        let length = normal.norm();
        if length <= f32::EPSILON {
            return Self::default();
        }
        Self {
            normal: normal / length,
            distance: coefficients.w / length,
        }
    }

    /// Signed distance of a point; negative means outside
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Six planes bounding what a camera can see
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes of a view-projection matrix (Gribb-Hartmann).
    ///
    /// Clip depth is `[0, 1]`, so the near plane is the third row alone.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { view_projection.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Conservative AABB test: the box is rejected only if its support
    /// corner along some plane normal lies outside that plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let (min, max) = (aabb.min(), aabb.max());
        self.planes.iter().all(|plane| {
            let support = Vec3::new(
                if plane.normal.x >= 0.0 { max.x } else { min.x },
                if plane.normal.y >= 0.0 { max.y } else { min.y },
                if plane.normal.z >= 0.0 { max.z } else { min.z },
            );
            plane.signed_distance(&support) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{constants, utils};
    use crate::render::primitives::camera::{Camera, Projection};

    fn test_camera() -> Camera {
        Camera::orbital(Vec3::zeros(), 5.0, 0.0, constants::HALF_PI).with_projection(Projection {
            fov_y: utils::deg_to_rad(90.0),
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        })
    }

    #[test]
    fn test_planes_are_normalized() {
        let camera = test_camera();
        for plane in &camera.frustum().planes {
            approx::assert_relative_eq!(plane.normal.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_box_at_origin_is_visible() {
        let frustum = test_camera().frustum().clone();
        let aabb = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_beyond_corner_is_culled() {
        let frustum = test_camera().frustum().clone();
        let aabb = Aabb::from_min_max(Vec3::new(5.1, 5.1, 0.0), Vec3::new(5.2, 5.2, 0.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_straddling_edge_is_visible() {
        let frustum = test_camera().frustum().clone();
        let aabb = Aabb::from_min_max(Vec3::new(-5.1, -5.1, 0.0), Vec3::new(-4.9, -4.9, 0.0));
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_behind_camera_is_culled() {
        let frustum = test_camera().frustum().clone();
        let aabb = Aabb::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.5, 0.5, 0.5));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_past_far_plane_is_culled() {
        let frustum = test_camera().frustum().clone();
        let aabb = Aabb::new(Vec3::new(0.0, 0.0, -200.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }
}
