use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Geometry as written by the collada to JSON converter.
///
/// Attributes are indexed separately per triangle corner; see
/// [`crate::mesh::VertexData::expand`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryPayload {
    #[serde(default)]
    pub joint_name_position_index: BTreeMap<String, usize>,
    pub vertex_positions: Vec<f32>,
    pub vertex_normals: Vec<f32>,
    #[serde(rename = "vertexUVs")]
    pub vertex_uvs: Vec<f32>,
    pub vertex_position_indices: Vec<u32>,
    pub vertex_normal_indices: Vec<u32>,
    #[serde(rename = "vertexUVIndices")]
    pub vertex_uv_indices: Vec<u32>,
    /// Per position, joint index to weight.
    #[serde(default)]
    pub vertex_joint_weights: Vec<BTreeMap<u32, f32>>,
}

/// Keyframes as written by the actions exporter.
///
/// Matrices are row-major, one per joint, in exported joint order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationPayload {
    #[serde(default)]
    pub joint_name_indices: BTreeMap<String, usize>,
    pub inverse_bind_poses: Vec<[f32; 16]>,
    /// Action name, then keyframe time in seconds (as a decimal string).
    pub actions: BTreeMap<String, BTreeMap<String, Vec<[f32; 16]>>>,
}

impl GeometryPayload {
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl AnimationPayload {
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(text)?)
    }
}
