use glam::{Mat4, Vec3};

use crate::util::space::{angle_normalize, clamp_pitch};

/// Free-look editor camera. Angles are kept in degrees.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Heading around +Y; 0 looks down -Z, positive turns right.
    pub yaw: f32,
    /// Elevation; positive looks up.
    pub pitch: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Mirrors horizontal mouse-look, for right-handed scene conventions.
    pub right_handed: bool,
    aspect: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vec3::new(0.0, 256.0, 512.0),
            yaw: 0.0,
            pitch: -25.0,
            fov_degrees: 90.0,
            near: 1.0,
            far: 16384.0,
            right_handed: false,
            aspect: 16.0 / 9.0,
        }
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.sin() * pitch.cos(), pitch.sin(), -yaw.cos() * pitch.cos())
    }

    /// Horizontal right vector; stays defined even when looking straight up or down.
    pub fn right(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        Vec3::new(yaw.cos(), 0.0, yaw.sin())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Turn by mouse-look deltas in degrees. Yaw wraps, pitch is clamped to
    /// `[pitch_down, pitch_up]`.
    pub fn look(&mut self, delta_yaw: f32, delta_pitch: f32, pitch_down: f32, pitch_up: f32) {
        let delta_yaw = if self.right_handed { -delta_yaw } else { delta_yaw };
        self.yaw = angle_normalize(self.yaw + delta_yaw);
        self.pitch = clamp_pitch(self.pitch + delta_pitch, pitch_down, pitch_up);
    }

    /// Move along the view direction and horizontal right vector.
    pub fn fly(&mut self, forward: f32, right: f32) {
        self.position += self.forward() * forward + self.right() * right;
    }

    /// Aim the camera at `target` without moving it.
    pub fn look_at(&mut self, target: Vec3) {
        let dir = target - self.position;
        if dir.length_squared() < 1e-8 {
            return;
        }
        let dir = dir.normalize();
        self.pitch = dir.y.clamp(-1.0, 1.0).asin().to_degrees();
        self.yaw = angle_normalize(dir.x.atan2(-dir.z).to_degrees());
    }
}
