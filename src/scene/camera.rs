//! Perspective camera

use std::cell::Cell;

use glam::{Mat4, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use crate::resources::Program;

/// Window rectangle the camera maps to, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        }
    }
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    fn origin(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Camera with lazily rebuilt view and projection matrices
#[derive(Debug, Clone)]
pub struct Camera {
    fov: f32,
    aspect: f32,
    depth_near: f32,
    depth_far: f32,
    position: Vec3,
    look_at: Vec3,
    up: Vec3,
    viewport: Viewport,
    // None until rebuilt after a change
    view: Cell<Option<Mat4>>,
    projection: Cell<Option<Mat4>>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 45.0,
            aspect: 1.0,
            depth_near: 1.0,
            depth_far: 100.0,
            position: Vec3::new(-10.0, 0.0, 10.0),
            look_at: Vec3::ZERO,
            up: Vec3::Y,
            viewport: Viewport::default(),
            view: Cell::new(None),
            projection: Cell::new(None),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vertical field of view in degrees
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
        self.projection.set(None);
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection.set(None);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_depth_range(&mut self, near: f32, far: f32) {
        self.depth_near = near;
        self.depth_far = far;
        self.projection.set(None);
    }

    pub fn depth_near(&self) -> f32 {
        self.depth_near
    }

    pub fn depth_far(&self) -> f32 {
        self.depth_far
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.view.set(None);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_look_at(&mut self, look_at: Vec3) {
        self.look_at = look_at;
        self.view.set(None);
    }

    pub fn look_at(&self) -> Vec3 {
        self.look_at
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
        self.view.set(None);
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Look along `direction` from the current position
    pub fn set_direction(&mut self, direction: Vec3) {
        self.set_look_at(self.position + direction);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Override the view matrix until the next position, look-at or up change
    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view.set(Some(view));
    }

    /// Override the projection matrix until the next fov, aspect or depth change
    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection.set(Some(projection));
    }

    pub fn view_matrix(&self) -> Mat4 {
        if let Some(view) = self.view.get() {
            return view;
        }
        let view = Mat4::look_at_rh(self.position, self.look_at, self.up);
        self.view.set(Some(view));
        view
    }

    /// Perspective projection; identity when the depth range, the field of
    /// view or the aspect ratio is degenerate.
    pub fn projection_matrix(&self) -> Mat4 {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let projection = self.build_projection();
        self.projection.set(Some(projection));
        projection
    }

    fn build_projection(&self) -> Mat4 {
        let radians = (self.fov / 2.0).to_radians();
        let delta_z = self.depth_far - self.depth_near;
        let sine = radians.sin();
        if delta_z == 0.0 || sine == 0.0 || self.aspect == 0.0 {
            return Mat4::IDENTITY;
        }
        let cotangent = radians.cos() / sine;
        let (near, far) = (self.depth_near, self.depth_far);

        Mat4::from_cols(
            Vec4::new(cotangent / self.aspect, 0.0, 0.0, 0.0),
            Vec4::new(0.0, cotangent, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -(far + near) / delta_z, -1.0),
            Vec4::new(0.0, 0.0, -2.0 * near * far / delta_z, 0.0),
        )
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World point to window coordinates; z is the depth in [0, 1].
    pub fn project(&self, point: Vec3) -> Option<Vec3> {
        let clip = self.view_projection_matrix() * point.extend(1.0);
        if clip.w == 0.0 {
            return None;
        }
        let ndc = clip.xyz() / clip.w * 0.5 + Vec3::splat(0.5);
        let window = self.viewport.origin() + self.viewport.size() * ndc.xy();
        Some(window.extend(ndc.z))
    }

    /// Window coordinates back to a world point
    pub fn unproject(&self, window: Vec3) -> Option<Vec3> {
        let normalized = (window.xy() - self.viewport.origin()) / self.viewport.size();
        let ndc = normalized.extend(window.z) * 2.0 - Vec3::ONE;
        let world = self.view_projection_matrix().inverse() * ndc.extend(1.0);
        if world.w == 0.0 {
            return None;
        }
        Some(world.xyz() / world.w)
    }

    /// Upload `u_projection` and `u_view` to the bound `program`.
    pub fn apply(&self, program: &Program) {
        if !program.set_uniform("u_projection", self.projection_matrix()) {
            log::trace!("Program has no u_projection uniform");
        }
        if !program.set_uniform("u_view", self.view_matrix()) {
            log::trace!("Program has no u_view uniform");
        }
    }
}
