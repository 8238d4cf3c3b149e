use std::f32::consts::{FRAC_PI_3, PI};

use glam::{Mat3, Mat4, Vec3};

use super::backend::ViewUniforms;

pub const MIN_PITCH: f32 = -0.5;
pub const MAX_PITCH: f32 = PI / 2.3;

/// Camera orbiting the origin, looking at it with y up.
///
/// `pitch` tilts the camera above the horizon, `yaw` turns it around the
/// y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub distance: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub light_position: Vec3,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            distance: 18.5,
            pitch: FRAC_PI_3,
            yaw: 0.0,
            fov_y: FRAC_PI_3,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
            light_position: Vec3::new(-2.0, 5.0, 2.0),
        }
    }
}

impl OrbitCamera {
    /// Drag by a pitch and yaw delta in radians. Pitch is clamped.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(MIN_PITCH, MAX_PITCH);
    }

    pub fn position(&self) -> Vec3 {
        let rotation = Mat4::from_rotation_y(self.yaw) * Mat4::from_rotation_x(-self.pitch);
        rotation.transform_point3(Vec3::Z * self.distance)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y, self.aspect, self.near, self.far)
    }

    /// The model sits at the origin untransformed, so the model matrix is
    /// the identity.
    pub fn uniforms(&self) -> ViewUniforms {
        let model = Mat4::IDENTITY;
        ViewUniforms::new(
            self.view() * model,
            self.projection(),
            Mat3::from_mat4(model),
            self.position(),
            self.light_position,
        )
    }
}
