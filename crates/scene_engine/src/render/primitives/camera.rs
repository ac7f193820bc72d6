//! # Camera
//!
//! A camera is projection parameters plus a navigation model. The view
//! matrix is always derived from the navigation model, so switching between
//! orbital and first-person navigation never leaves stale orientation state
//! behind.
//!
//! ## Coordinate System
//! World space is right-handed and Y-up. The view matrix looks down -Z; the
//! Vulkan conventions (Y-down, depth `[0, 1]`) are applied by inserting
//! [`Mat4Ext::vulkan_coordinate_transform`] between view and projection, so
//! the full chain is `P * X * V`.
//!
//! ## Frustum Cache
//! [`Camera::frustum`] returns the frustum computed by the last call to
//! [`Camera::update_frustum`]. The render pipeline refreshes it once per
//! frame before culling.

use crate::foundation::math::{constants, utils, Mat4, Mat4Ext, Vec3};
use crate::input::{InputSource, Key, MouseButton};
use crate::scene::frustum::Frustum;

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width / height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y: utils::deg_to_rad(60.0),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    /// Projection matrix without the Vulkan axis flip
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.near, self.far)
    }
}

/// How the camera is positioned and oriented
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Navigation {
    /// Orbit around a target point on a sphere
    Orbital {
        /// Point looked at
        target: Vec3,
        /// Radius of the orbit
        distance: f32,
        /// Azimuth around +Y in radians, 0 = +Z side
        phi: f32,
        /// Polar angle from +Y in radians
        theta: f32,
    },
    /// Free flight
    FirstPerson {
        /// Eye position
        position: Vec3,
        /// Rotation around +Y in radians, 0 = looking down -Z
        yaw: f32,
        /// Elevation in radians, positive looks up
        pitch: f32,
    },
}

/// Input sensitivities used by the camera controllers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraControls {
    /// Radians per pixel of mouse drag
    pub rotate_speed: f32,
    /// Fraction of the orbit distance per scroll step
    pub zoom_speed: f32,
    /// World units per second in first-person mode
    pub move_speed: f32,
}

impl Default for CameraControls {
    fn default() -> Self {
        Self {
            rotate_speed: 0.005,
            zoom_speed: 0.1,
            move_speed: 5.0,
        }
    }
}

const MIN_THETA: f32 = 0.01;
const MAX_PITCH: f32 = constants::HALF_PI - 0.01;
const MIN_DISTANCE: f32 = 0.1;

/// Camera with perspective projection and a cached view frustum
#[derive(Debug, Clone)]
pub struct Camera {
    /// Projection parameters
    pub projection: Projection,
    /// Navigation model
    pub navigation: Navigation,
    /// Controller sensitivities
    pub controls: CameraControls,
    frustum: Frustum,
}

impl Default for Camera {
    fn default() -> Self {
        Self::orbital(Vec3::zeros(), 5.0, 0.0, constants::HALF_PI)
    }
}

impl Camera {
    /// Orbital camera; angles in radians
    pub fn orbital(target: Vec3, distance: f32, phi: f32, theta: f32) -> Self {
        Self::with_navigation(Navigation::Orbital {
            target,
            distance: distance.max(MIN_DISTANCE),
            phi,
            theta: theta.clamp(MIN_THETA, constants::PI - MIN_THETA),
        })
    }

    /// First-person camera; angles in radians
    pub fn first_person(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self::with_navigation(Navigation::FirstPerson {
            position,
            yaw,
            pitch: pitch.clamp(-MAX_PITCH, MAX_PITCH),
        })
    }

    fn with_navigation(navigation: Navigation) -> Self {
        let mut camera = Self {
            projection: Projection::default(),
            navigation,
            controls: CameraControls::default(),
            frustum: Frustum::default(),
        };
        camera.update_frustum();
        camera
    }

    /// Builder: replace the projection
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self.update_frustum();
        self
    }

    /// Set width / height of the viewport
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.projection.aspect = aspect;
        }
    }

    /// Eye position in world space
    pub fn position(&self) -> Vec3 {
        match self.navigation {
            Navigation::Orbital {
                target,
                distance,
                phi,
                theta,
            } => target + utils::spherical_direction(phi, theta) * distance,
            Navigation::FirstPerson { position, .. } => position,
        }
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        match self.navigation {
            Navigation::Orbital { phi, theta, .. } => -utils::spherical_direction(phi, theta),
            Navigation::FirstPerson { yaw, pitch, .. } => {
                let (sin_yaw, cos_yaw) = yaw.sin_cos();
                let (sin_pitch, cos_pitch) = pitch.sin_cos();
                Vec3::new(sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
            }
        }
    }

    /// World to view matrix (view looks down -Z)
    pub fn view_matrix(&self) -> Mat4 {
        let position = self.position();
        let forward = self.forward();
        Mat4::look_at(position, position + forward, utils::stable_up(&forward))
    }

    /// View to clip matrix including the Vulkan axis flip (`P * X`)
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix() * Mat4::vulkan_coordinate_transform()
    }

    /// Combined `P * X * V`
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Recompute the cached frustum from the current matrices
    pub fn update_frustum(&mut self) {
        self.frustum = Frustum::from_view_projection(&self.view_projection_matrix());
    }

    /// Frustum as of the last [`Camera::update_frustum`]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Apply one frame of user input through the controller matching the
    /// navigation model.
    pub fn handle_input(&mut self, input: &dyn InputSource, delta_time: f32) {
        let controls = self.controls;
        match &mut self.navigation {
            Navigation::Orbital {
                distance,
                phi,
                theta,
                ..
            } => {
                if input.is_mouse_down(MouseButton::Left) {
                    let delta = input.cursor_delta();
                    *phi -= delta.x * controls.rotate_speed;
                    *theta = (*theta - delta.y * controls.rotate_speed)
                        .clamp(MIN_THETA, constants::PI - MIN_THETA);
                }
                let scroll = input.scroll_delta();
                if scroll != 0.0 {
                    *distance = (*distance * (1.0 - scroll * controls.zoom_speed)).max(MIN_DISTANCE);
                }
            }
            Navigation::FirstPerson { yaw, pitch, .. } => {
                if input.is_mouse_down(MouseButton::Right) {
                    let delta = input.cursor_delta();
                    *yaw += delta.x * controls.rotate_speed;
                    *pitch = (*pitch - delta.y * controls.rotate_speed).clamp(-MAX_PITCH, MAX_PITCH);
                }
                let forward = self.forward();
                let right = forward.cross(&Vec3::y()).normalize();
                let mut movement = Vec3::zeros();
                for (key, direction) in [
                    (Key::W, forward),
                    (Key::S, -forward),
                    (Key::D, right),
                    (Key::A, -right),
                    (Key::E, Vec3::y()),
                    (Key::Q, -Vec3::y()),
                ] {
                    if input.is_key_down(key) {
                        movement += direction;
                    }
                }
                if movement.norm_squared() > 0.0 {
                    if let Navigation::FirstPerson { position, .. } = &mut self.navigation {
                        *position += movement.normalize() * controls.move_speed * delta_time;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Vec2, Vec4};
    use crate::input::InputState;
    use approx::assert_relative_eq;

    #[test]
    fn test_orbital_position_on_sphere() {
        let camera = Camera::orbital(Vec3::new(1.0, 0.0, 0.0), 5.0, 0.0, constants::HALF_PI);
        assert_relative_eq!(camera.position(), Vec3::new(1.0, 0.0, 5.0), epsilon = 1e-5);
        assert_relative_eq!(camera.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::orbital(Vec3::zeros(), 5.0, 0.3, 1.0);
        let clip = camera.view_projection_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.w > 0.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_world_up_maps_to_screen_top() {
        let camera = Camera::orbital(Vec3::zeros(), 5.0, 0.0, constants::HALF_PI);
        let clip = camera.view_projection_matrix() * Vec4::new(0.0, 1.0, 0.0, 1.0);
        // Vulkan NDC has Y pointing down
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn test_first_person_looks_down_negative_z_at_zero_yaw() {
        let camera = Camera::first_person(Vec3::zeros(), 0.0, 0.0);
        assert_relative_eq!(camera.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_orbital_drag_and_zoom() {
        let mut camera = Camera::orbital(Vec3::zeros(), 10.0, 0.0, constants::HALF_PI);
        let mut input = InputState::new();
        input.set_mouse_button(MouseButton::Left, true);
        input.add_cursor_delta(Vec2::new(100.0, 0.0));
        input.add_scroll(1.0);
        camera.handle_input(&input, 0.016);

        match camera.navigation {
            Navigation::Orbital { distance, phi, .. } => {
                assert_relative_eq!(phi, -0.5, epsilon = 1e-6);
                assert_relative_eq!(distance, 9.0, epsilon = 1e-5);
            }
            Navigation::FirstPerson { .. } => panic!("navigation changed"),
        }
    }

    #[test]
    fn test_theta_clamped_away_from_poles() {
        let mut camera = Camera::orbital(Vec3::zeros(), 10.0, 0.0, 0.1);
        let mut input = InputState::new();
        input.set_mouse_button(MouseButton::Left, true);
        input.add_cursor_delta(Vec2::new(0.0, 1000.0));
        camera.handle_input(&input, 0.016);
        match camera.navigation {
            Navigation::Orbital { theta, .. } => assert_relative_eq!(theta, MIN_THETA),
            Navigation::FirstPerson { .. } => panic!("navigation changed"),
        }
    }

    #[test]
    fn test_first_person_moves_forward() {
        let mut camera = Camera::first_person(Vec3::zeros(), 0.0, 0.0);
        let mut input = InputState::new();
        input.set_key(Key::W, true);
        camera.handle_input(&input, 1.0);
        assert_relative_eq!(camera.position(), Vec3::new(0.0, 0.0, -5.0), epsilon = 1e-5);
    }
}
