use glam::Vec3;
use log::{debug, info, trace};
use rigview::{
    animation::blend::Pose,
    asset::{dualquat::DualQuat, skin::JOINT_COUNT},
    render::{
        backend::{JointUniforms, MeshBuffers, RenderBackend, ViewUniforms},
        shader::skin_vertex,
        texture::TextureImage,
    },
};

/// Backend without a GPU: keeps the last uploads and logs what a real
/// backend would draw.
#[derive(Debug)]
pub struct LogBackend {
    mesh: MeshBuffers,
    pose: Pose,
    draws: u64,
    report_every: u64,
}

impl LogBackend {
    /// Logs the skinned bounds once every `report_every` draws.
    pub fn new(report_every: u64) -> Self {
        Self {
            mesh: MeshBuffers::default(),
            pose: [DualQuat::IDENTITY; JOINT_COUNT],
            draws: 0,
            report_every: report_every.max(1),
        }
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Axis aligned bounds of the mesh under the last joint upload.
    pub fn skinned_bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self
            .mesh
            .vertices
            .iter()
            .map(|vertex| skin_vertex(&self.pose, vertex));
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), point| {
            (min.min(point), max.max(point))
        }))
    }
}

impl RenderBackend for LogBackend {
    fn clear(&mut self) {}

    fn upload_mesh(&mut self, mesh: &MeshBuffers) {
        info!(
            "Mesh uploaded: {} vertices, {} indices, {} bytes",
            mesh.vertices.len(),
            mesh.index_count(),
            mesh.vertex_bytes().len()
        );
        self.mesh = mesh.clone();
    }

    fn upload_texture(&mut self, texture: &TextureImage) {
        info!("Texture uploaded: {}x{}", texture.width, texture.height);
    }

    fn set_joints(&mut self, joints: &JointUniforms) {
        for (joint, out) in self.pose.iter_mut().enumerate() {
            let [rx, ry, rz, rw] = joints.rotations[joint];
            let [tx, ty, tz, tw] = joints.translations[joint];
            *out = DualQuat::from_array([rx, ry, rz, rw, tx, ty, tz, tw]);
        }
    }

    fn set_view(&mut self, view: &ViewUniforms) {
        trace!("Camera at {:?}", view.camera_position);
    }

    fn draw_indexed(&mut self, count: u32) {
        self.draws += 1;
        trace!("Draw {} indices", count);
        if self.draws % self.report_every == 0 {
            if let Some((min, max)) = self.skinned_bounds() {
                debug!("Frame {}: skinned bounds {} .. {}", self.draws, min, max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec3};
    use rigview::{
        asset::{dualquat::DualQuat, skin::JOINT_COUNT},
        render::backend::{JointUniforms, MeshBuffers, RenderBackend, SkinnedVertex},
    };

    use super::LogBackend;

    fn vertex(position: [f32; 3]) -> SkinnedVertex {
        SkinnedVertex {
            position,
            joint_weights: [1.0, 0.0, 0.0, 0.0],
            ..Default::default()
        }
    }

    #[test]
    fn bounds_follow_joints() {
        let mut backend = LogBackend::new(1);
        assert!(backend.skinned_bounds().is_none());

        backend.upload_mesh(&MeshBuffers {
            vertices: vec![vertex([1.0, 0.0, 0.0]), vertex([0.0, 0.0, 1.0])],
            indices: vec![0, 1, 0],
        });
        let (min, max) = backend.skinned_bounds().unwrap();
        // z-up (0,0,1) lands on y-up (0,1,0)
        assert!(min.abs_diff_eq(Vec3::ZERO, 1.0e-6));
        assert!(max.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1.0e-6));

        let mut pose = [DualQuat::IDENTITY; JOINT_COUNT];
        pose[0] = DualQuat::new(Quat::from_rotation_z(FRAC_PI_2), Vec3::ZERO);
        backend.set_joints(&JointUniforms::from_pose(&pose));
        let (min, max) = backend.skinned_bounds().unwrap();
        // (1,0,0) turns into (0,1,0), which is (0,0,-1) y-up
        assert!(min.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1.0e-5));
        assert!(max.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1.0e-5));

        backend.draw_indexed(3);
        assert_eq!(backend.draws(), 1);
    }
}
