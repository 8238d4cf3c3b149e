use glam::Mat4;

/// Number of joints compiled into the skinning shader.
///
/// Every published scene must carry exactly this many joints; the shader
/// source, the uniform upload and the blender all size their arrays from it.
pub const JOINT_COUNT: usize = 18;

#[derive(Debug, Clone)]
pub struct SkinAsset {
    pub joint_names: Vec<String>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl SkinAsset {
    pub fn joint_count(&self) -> usize {
        self.inverse_bind_matrices.len()
    }
}

/// Exporters disagree on whether joint names use `_` or `.` as separator.
pub(crate) fn normalize_joint_name(name: &str) -> String {
    name.replace('_', ".")
}
