//! Camera looking at the body from orbit.

use glam::{DVec3, Mat4, Vec3};

/// Perspective camera in body space. Positions stay `f64` until the
/// view-projection is built.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: DVec3,
    pub target: DVec3,
    pub up: DVec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Camera at `position` looking at the body centre.
    pub fn looking_at_origin(position: DVec3) -> Self {
        let up = if position.normalize_or_zero().dot(DVec3::Y).abs() > 0.99 {
            DVec3::Z
        } else {
            DVec3::Y
        };
        Self {
            position,
            target: DVec3::ZERO,
            up,
            ..Self::default()
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            self.position.as_vec3(),
            self.target.as_vec3(),
            self.up.as_vec3(),
        )
    }

    /// Reverse-Z: the near plane maps to depth 1, the far plane to 0.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.far, self.near)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero().as_vec3()
    }

    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        self.aspect_ratio = width as f32 / height.max(1) as f32;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 3000.0),
            target: DVec3::ZERO,
            up: DVec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect_ratio: 16.0 / 9.0,
            near: 1.0,
            far: 100_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_forward_points_at_target() {
        let camera = Camera::looking_at_origin(DVec3::new(0.0, 0.0, 2500.0));
        let f = camera.forward();
        assert!((f - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_up_switches_near_pole() {
        let camera = Camera::looking_at_origin(DVec3::new(0.0, 2500.0, 0.0));
        assert_eq!(camera.up, DVec3::Z);
        // Matrix must still be finite.
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn test_reverse_z_depth() {
        let camera = Camera {
            position: DVec3::ZERO,
            target: DVec3::NEG_Z,
            near: 1.0,
            far: 1000.0,
            ..Camera::default()
        };
        let vp = camera.view_projection_matrix();
        let depth = |z: f32| {
            let clip = vp * Vec4::new(0.0, 0.0, z, 1.0);
            clip.z / clip.w
        };
        assert!((depth(-1.0) - 1.0).abs() < 1e-4);
        assert!(depth(-1000.0).abs() < 1e-4);
        assert!(depth(-10.0) > depth(-100.0));
    }

    #[test]
    fn test_aspect_ratio() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(1920, 1080);
        assert!((camera.aspect_ratio - 16.0 / 9.0).abs() < 1e-6);
        camera.set_aspect_ratio(100, 0);
        assert!(camera.aspect_ratio.is_finite());
    }
}
