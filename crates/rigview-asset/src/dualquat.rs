use glam::{Mat4, Quat, Vec3, Vec4};

/// Unit dual quaternions below this rotation magnitude are treated as
/// degenerate and collapse to the identity.
const MIN_MAGNITUDE: f32 = 1.0e-6;

/// Rigid transform encoded as a dual quaternion.
///
/// `real` holds the rotation, `dual` holds the translation multiplied into
/// the rotation: `dual = ½ · (t, 0) ⊗ real`. Both are stored in `x, y, z, w`
/// order, which is also the layout uploaded to the shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualQuat {
    pub real: Quat,
    pub dual: Quat,
}

impl Default for DualQuat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Hamilton product, written out so that non-unit operands stay exact.
fn hamilton(a: Quat, b: Quat) -> Quat {
    Quat::from_xyzw(
        a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
    )
}

impl DualQuat {
    pub const IDENTITY: Self = Self {
        real: Quat::IDENTITY,
        dual: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
    };

    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        let pure = Quat::from_xyzw(translation.x, translation.y, translation.z, 0.0);
        Self {
            real: rotation,
            dual: hamilton(pure, rotation) * 0.5,
        }
    }

    /// Converts a rigid (rotation + translation only) matrix.
    ///
    /// Scale or shear in `matrix` gives an unspecified result.
    pub fn from_rigid_mat4(matrix: &Mat4) -> Self {
        let rotation = Quat::from_mat4(matrix).normalize();
        Self::new(rotation, matrix.w_axis.truncate())
    }

    pub fn from_array(array: [f32; 8]) -> Self {
        Self {
            real: Quat::from_xyzw(array[0], array[1], array[2], array[3]),
            dual: Quat::from_xyzw(array[4], array[5], array[6], array[7]),
        }
    }

    pub fn to_array(&self) -> [f32; 8] {
        let [rx, ry, rz, rw] = self.real.to_array();
        let [dx, dy, dz, dw] = self.dual.to_array();
        [rx, ry, rz, rw, dx, dy, dz, dw]
    }

    pub fn rotation_magnitude(&self) -> f32 {
        Vec4::from(self.real).length()
    }

    /// Divides both parts by the rotation magnitude.
    ///
    /// The dual part is never normalized on its own, so the encoded
    /// translation survives.
    pub fn normalize(&self) -> Self {
        let magnitude = self.rotation_magnitude();
        if magnitude <= MIN_MAGNITUDE {
            return Self::IDENTITY;
        }
        Self {
            real: self.real / magnitude,
            dual: self.dual / magnitude,
        }
    }

    /// Component-wise blend, `self` at `t = 0` and `other` at `t = 1`.
    ///
    /// `other` is flipped into the hemisphere of `self` first; `q` and `-q`
    /// encode the same transform. The result is not normalized.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let other = if Vec4::from(self.real).dot(Vec4::from(other.real)) < 0.0 {
            other.negate()
        } else {
            *other
        };
        let s = 1.0 - t;
        Self {
            real: Quat::from_vec4(Vec4::from(self.real) * s + Vec4::from(other.real) * t),
            dual: Quat::from_vec4(Vec4::from(self.dual) * s + Vec4::from(other.dual) * t),
        }
    }

    pub fn negate(&self) -> Self {
        Self {
            real: Quat::from_vec4(-Vec4::from(self.real)),
            dual: Quat::from_vec4(-Vec4::from(self.dual)),
        }
    }

    pub fn rotation(&self) -> Quat {
        self.normalize().real
    }

    /// `t = 2 · (dual ⊗ conj(real))` on the normalized value.
    pub fn translation(&self) -> Vec3 {
        let unit = self.normalize();
        let (r, d) = (unit.real, unit.dual);
        Vec3::new(
            2.0 * (-d.w * r.x + d.x * r.w - d.y * r.z + d.z * r.y),
            2.0 * (-d.w * r.y + d.x * r.z + d.y * r.w - d.z * r.x),
            2.0 * (-d.w * r.z - d.x * r.y + d.y * r.x + d.z * r.w),
        )
    }

    /// Rebuilds the rigid matrix with the same arithmetic as the skinning
    /// shader, normalization included.
    pub fn to_mat4(&self) -> Mat4 {
        let unit = self.normalize();
        let [x, y, z, w] = unit.real.to_array();
        let t = unit.translation();
        #[rustfmt::skip]
        let columns = [
            1.0 - 2.0 * y * y - 2.0 * z * z, 2.0 * x * y + 2.0 * w * z,       2.0 * x * z - 2.0 * w * y,       0.0,
            2.0 * x * y - 2.0 * w * z,       1.0 - 2.0 * x * x - 2.0 * z * z, 2.0 * y * z + 2.0 * w * x,       0.0,
            2.0 * x * z + 2.0 * w * y,       2.0 * y * z - 2.0 * w * x,       1.0 - 2.0 * x * x - 2.0 * y * y, 0.0,
            t.x,                             t.y,                             t.z,                             1.0,
        ];
        Mat4::from_cols_array(&columns)
    }

    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f32) -> bool {
        self.real.abs_diff_eq(other.real, max_abs_diff)
            && self.dual.abs_diff_eq(other.dual, max_abs_diff)
    }
}

/// Shader friendly pair: rotation quaternion, translation quaternion.
impl From<DualQuat> for [[f32; 4]; 2] {
    fn from(dq: DualQuat) -> [[f32; 4]; 2] {
        [dq.real.to_array(), dq.dual.to_array()]
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Mat4, Quat, Vec3};

    use super::DualQuat;

    const EPSILON: f32 = 1.0e-4;

    #[test]
    fn identity_matrix_is_identity() {
        let dq = DualQuat::from_rigid_mat4(&Mat4::IDENTITY);
        assert!(dq.abs_diff_eq(&DualQuat::IDENTITY, EPSILON));
        assert!(DualQuat::IDENTITY.to_mat4().abs_diff_eq(Mat4::IDENTITY, EPSILON));
    }

    #[test]
    fn matrix_survives_conversion() {
        let rotation = Quat::from_axis_angle(Vec3::new(0.62, -0.25, 0.74).normalize(), -1.491);
        let translation = Vec3::new(-12.6, 4.2, 0.004);
        let matrix = Mat4::from_rotation_translation(rotation, translation);

        let dq = DualQuat::from_rigid_mat4(&matrix);
        assert!(dq.translation().abs_diff_eq(translation, EPSILON));
        assert!(dq.to_mat4().abs_diff_eq(matrix, EPSILON));
    }

    #[test]
    fn normalize_divides_dual_by_rotation_magnitude() {
        let dq = DualQuat::new(Quat::from_rotation_z(0.3), Vec3::new(1.0, 2.0, 3.0));
        let scaled = DualQuat::from_array(dq.to_array().map(|value| value * 3.0));
        let normalized = scaled.normalize();
        assert!(normalized.abs_diff_eq(&dq, EPSILON));
        assert!(normalized.translation().abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), EPSILON));
    }

    #[test]
    fn normalize_is_idempotent() {
        let dq = DualQuat::new(
            Quat::from_rotation_x(FRAC_PI_2),
            Vec3::new(-5.33, 0.00326, 9.31),
        );
        let once = dq.normalize();
        let twice = once.normalize();
        assert!(once.abs_diff_eq(&twice, 1.0e-6));
        assert!((twice.rotation_magnitude() - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn zero_rotation_falls_back_to_identity() {
        let zero = DualQuat::from_array([0.0; 8]);
        assert_eq!(zero.normalize(), DualQuat::IDENTITY);
    }

    #[test]
    fn lerp_takes_short_arc() {
        let a = DualQuat::new(Quat::from_rotation_y(0.2), Vec3::X);
        let b = a.negate();
        let blended = a.lerp(&b, 0.5).normalize();
        assert!(blended.abs_diff_eq(&a, EPSILON));
    }

    #[test]
    fn shader_layout() {
        let dq = DualQuat::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let layout: [[f32; 4]; 2] = dq.into();
        assert_eq!(layout, [[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]);
    }
}
