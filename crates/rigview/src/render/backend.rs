use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use rigview_asset::{mesh::VertexData, skin::JOINT_COUNT};

use crate::animation::blend::Pose;

use super::texture::TextureImage;

/// Interleaved vertex as bound to the skinning shader attributes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default, PartialEq)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Joint indices as floats, the shader reads them through a `vec4`.
    pub joint_indices: [f32; 4],
    pub joint_weights: [f32; 4],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn from_vertex_data(data: &VertexData) -> Self {
        let vertices = (0..data.vertex_count())
            .map(|index| SkinnedVertex {
                position: data.positions[index].to_array(),
                normal: data.normals.get(index).copied().unwrap_or(Vec3::Z).to_array(),
                uv: data.uvs.get(index).map(|uv| uv.to_array()).unwrap_or_default(),
                joint_indices: data
                    .joint_indices
                    .get(index)
                    .map(|joints| joints.map(|joint| joint as f32))
                    .unwrap_or_default(),
                joint_weights: data.joint_weights.get(index).copied().unwrap_or_default(),
            })
            .collect();
        Self {
            vertices,
            indices: data.indices.clone(),
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// `boneRotQuaternions` and `boneTransQuaternions`, in joint order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct JointUniforms {
    pub rotations: [[f32; 4]; JOINT_COUNT],
    pub translations: [[f32; 4]; JOINT_COUNT],
}

impl JointUniforms {
    pub fn from_pose(pose: &Pose) -> Self {
        let mut uniforms = Self::zeroed();
        for (joint, dq) in pose.iter().enumerate() {
            let [rotation, translation]: [[f32; 4]; 2] = (*dq).into();
            uniforms.rotations[joint] = rotation;
            uniforms.translations[joint] = translation;
        }
        uniforms
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct ViewUniforms {
    pub model_view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    // mat3 padded to three vec4 columns
    pub normal: [[f32; 4]; 3],
    pub camera_position: [f32; 4],
    pub light_position: [f32; 4],
}

impl ViewUniforms {
    pub fn new(
        model_view: Mat4,
        projection: Mat4,
        normal: Mat3,
        camera_position: Vec3,
        light_position: Vec3,
    ) -> Self {
        Self {
            model_view: model_view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            normal: [
                normal.x_axis.extend(0.0).to_array(),
                normal.y_axis.extend(0.0).to_array(),
                normal.z_axis.extend(0.0).to_array(),
            ],
            camera_position: camera_position.extend(1.0).to_array(),
            light_position: light_position.extend(1.0).to_array(),
        }
    }
}

/// Everything the render loop needs from a graphics API.
///
/// Implementations own the GPU resources; the loop only hands over plain
/// data. `upload_mesh` and `upload_texture` replace what was uploaded
/// before.
pub trait RenderBackend {
    fn clear(&mut self);
    fn upload_mesh(&mut self, mesh: &MeshBuffers);
    fn upload_texture(&mut self, texture: &TextureImage);
    fn set_joints(&mut self, joints: &JointUniforms);
    fn set_view(&mut self, view: &ViewUniforms);
    /// Draws `count` indices of the uploaded mesh as triangles.
    fn draw_indexed(&mut self, count: u32);
}
