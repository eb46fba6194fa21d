//! Mouse-driven rotation around the origin

use glam::{Mat3, Quat, Vec3};

use super::camera::Camera;

/// Accumulated rotation; each new rotation is applied in the local frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Trackball {
    rotation: Quat,
}

impl Trackball {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate by a mouse drag of (`dx`, `dy`) pixels
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.rotate_y(-dx / 5.0);
        self.rotate_x(-dy / 5.0);
    }

    pub fn rotate_x(&mut self, degrees: f32) {
        self.rotate_axis(degrees, Vec3::X);
    }

    pub fn rotate_y(&mut self, degrees: f32) {
        self.rotate_axis(degrees, Vec3::Y);
    }

    pub fn rotate_z(&mut self, degrees: f32) {
        self.rotate_axis(degrees, Vec3::Z);
    }

    pub fn rotate_axis(&mut self, degrees: f32, axis: Vec3) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.rotation = (self.rotation * Quat::from_axis_angle(axis, degrees.to_radians())).normalize();
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn reset(&mut self) {
        self.rotation = Quat::IDENTITY;
    }

    pub fn transform(&self, v: Vec3) -> Vec3 {
        self.rotation * v
    }

    /// Copy of `camera` with position, look-at and up rotated
    pub fn transform_camera(&self, camera: &Camera) -> Camera {
        let mut rotated = camera.clone();
        rotated.set_position(self.transform(camera.position()));
        rotated.set_look_at(self.transform(camera.look_at()));
        rotated.set_up(self.transform(camera.up()));
        rotated
    }

    pub fn x_axis(&self) -> Vec3 {
        Mat3::from_quat(self.rotation).row(0)
    }

    pub fn y_axis(&self) -> Vec3 {
        Mat3::from_quat(self.rotation).row(1)
    }

    pub fn z_axis(&self) -> Vec3 {
        Mat3::from_quat(self.rotation).row(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_rotates_around_y() {
        let mut trackball = Trackball::new();
        // 450 pixels left is a 90 degree turn
        trackball.rotate(-450.0, 0.0);
        let v = trackball.transform(Vec3::X);
        assert!(v.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }

    #[test]
    fn test_axes_are_matrix_rows() {
        let mut trackball = Trackball::new();
        trackball.rotate_z(90.0);
        assert!(trackball.x_axis().abs_diff_eq(Vec3::new(0.0, -1.0, 0.0), 1e-5));
        assert!(trackball.y_axis().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
        assert!(trackball.z_axis().abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn test_transform_camera() {
        let mut trackball = Trackball::new();
        trackball.rotate_y(180.0);
        let camera = trackball.transform_camera(&Camera::default());
        assert!(camera.position().abs_diff_eq(Vec3::new(10.0, 0.0, -10.0), 1e-4));
        assert!(camera.up().abs_diff_eq(Vec3::Y, 1e-5));

        trackball.reset();
        assert_eq!(trackball.rotation(), Quat::IDENTITY);
    }
}
