use std::collections::{hash_map::Entry, HashMap};

use glam::{Vec2, Vec3};

use crate::{error::PayloadError, payload::GeometryPayload, skin::JOINT_COUNT};

pub const INFLUENCES_PER_VERTEX: usize = 4;

/// Expanded, render ready vertex attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub joint_indices: Vec<[u32; INFLUENCES_PER_VERTEX]>,
    pub joint_weights: Vec<[f32; INFLUENCES_PER_VERTEX]>,
    pub indices: Vec<u32>,
}

fn fetch<const N: usize>(
    data: &[f32],
    index: u32,
    attribute: &'static str,
) -> Result<[f32; N], PayloadError> {
    let start = index as usize * N;
    data.get(start..start + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(PayloadError::IndexOutOfRange {
            attribute,
            index,
            len: data.len() / N,
        })
}

impl VertexData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Turns separately indexed attributes into one vertex per distinct
    /// (position, normal, uv) triple.
    pub fn expand(payload: &GeometryPayload) -> Result<Self, PayloadError> {
        let corners = payload.vertex_position_indices.len();
        if payload.vertex_normal_indices.len() != corners
            || payload.vertex_uv_indices.len() != corners
            || corners % 3 != 0
        {
            return Err(PayloadError::CornerCount {
                positions: corners,
                normals: payload.vertex_normal_indices.len(),
                uvs: payload.vertex_uv_indices.len(),
            });
        }

        let mut data = Self::default();
        let mut seen: HashMap<(u32, u32, u32), u32> = HashMap::new();
        for corner in 0..corners {
            let key = (
                payload.vertex_position_indices[corner],
                payload.vertex_normal_indices[corner],
                payload.vertex_uv_indices[corner],
            );
            let index = match seen.entry(key) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let (position, normal, uv) = key;
                    let index = data.positions.len() as u32;
                    data.positions.push(Vec3::from_array(fetch(
                        &payload.vertex_positions,
                        position,
                        "positions",
                    )?));
                    data.normals.push(Vec3::from_array(fetch(
                        &payload.vertex_normals,
                        normal,
                        "normals",
                    )?));
                    data.uvs
                        .push(Vec2::from_array(fetch(&payload.vertex_uvs, uv, "uvs")?));
                    let (joints, weights) = strongest_influences(payload, position)?;
                    data.joint_indices.push(joints);
                    data.joint_weights.push(weights);
                    entry.insert(index);
                    index
                }
            };
            data.indices.push(index);
        }
        Ok(data)
    }
}

fn strongest_influences(
    payload: &GeometryPayload,
    position: u32,
) -> Result<([u32; INFLUENCES_PER_VERTEX], [f32; INFLUENCES_PER_VERTEX]), PayloadError> {
    let mut joints = [0; INFLUENCES_PER_VERTEX];
    let mut weights = [0.0; INFLUENCES_PER_VERTEX];
    let Some(influences) = payload.vertex_joint_weights.get(position as usize) else {
        return Ok((joints, weights));
    };

    let mut influences: Vec<(u32, f32)> = influences
        .iter()
        .map(|(joint, weight)| (*joint, *weight))
        .collect();
    if let Some((joint, _)) = influences
        .iter()
        .find(|(joint, _)| *joint as usize >= JOINT_COUNT)
    {
        return Err(PayloadError::JointIndex {
            vertex: position as usize,
            joint: *joint,
        });
    }
    influences.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (slot, (joint, weight)) in influences
        .into_iter()
        .take(INFLUENCES_PER_VERTEX)
        .enumerate()
    {
        joints[slot] = joint;
        weights[slot] = weight;
    }
    Ok((joints, weights))
}
