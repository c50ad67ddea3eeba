//! Free-fly camera with yaw/pitch mouse look.
//!
//! Angles are kept in degrees. The basis vectors are cached and refreshed
//! whenever yaw or pitch change, so `view_matrix` is just a lookup.

use glam::{Mat4, Vec3};

const WORLD_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT: f32 = 89.0;
const MIN_FOV: f32 = 1.0;
const MAX_FOV: f32 = 90.0;

/// Movement request relative to where the camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Free-fly camera state.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    pub speed: f32,
    pub sensitivity: f32,
    pub near: f32,
    pub far: f32,
    yaw: f32,
    pitch: f32,
    fov_y: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Default for FlyCamera {
    fn default() -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 2.0, 5.0),
            speed: 5.0,
            sensitivity: 0.1,
            near: 0.1,
            far: 1000.0,
            yaw: -90.0,
            pitch: 0.0,
            fov_y: 45.0,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
        };
        camera.update_vectors();
        camera
    }
}

impl FlyCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit vector the camera is looking along.
    pub fn forward(&self) -> Vec3 {
        self.front
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Vertical field of view in degrees.
    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// Move one step along `direction`, scaled by `speed` and the frame time.
    ///
    /// Forward follows the full look direction, so a pitched camera flies;
    /// vertical movement is along world up regardless of pitch.
    pub fn translate(&mut self, direction: MoveDirection, dt: f32) {
        let offset = match direction {
            MoveDirection::Forward => self.front,
            MoveDirection::Backward => -self.front,
            MoveDirection::Left => -self.right,
            MoveDirection::Right => self.right,
            MoveDirection::Up => WORLD_UP,
            MoveDirection::Down => -WORLD_UP,
        };
        self.position += offset * self.speed * dt;
    }

    /// Apply a raw mouse motion delta. Positive `dy` (cursor moving down)
    /// pitches the view down. Pitch is clamped short of the poles so the
    /// view never flips.
    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Apply a scroll delta: scrolling up narrows the field of view.
    pub fn process_scroll(&mut self, delta: f32) {
        self.fov_y = (self.fov_y - delta).clamp(MIN_FOV, MAX_FOV);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection with wgpu's 0..1 depth range.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), aspect, self.near, self.far)
    }

    fn update_vectors(&mut self) {
        let (yaw_sin, yaw_cos) = self.yaw.to_radians().sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.to_radians().sin_cos();
        self.front = Vec3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize();
        self.right = self.front.cross(WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}
