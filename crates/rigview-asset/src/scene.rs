use std::collections::BTreeMap;

use glam::Mat4;
use log::{debug, warn};

use crate::{
    animation::{Action, Keyframe, KeyframeStore},
    dualquat::DualQuat,
    error::PayloadError,
    mesh::VertexData,
    payload::{AnimationPayload, GeometryPayload},
    skin::{normalize_joint_name, SkinAsset, JOINT_COUNT},
};

/// Everything a client needs to draw one reload: built once, never mutated,
/// replaced as a whole by the next reload.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub vertex_data: VertexData,
    pub actions: KeyframeStore,
    pub skin: SkinAsset,
}

impl SceneState {
    /// Builds a scene from the two exporter payloads, both still JSON text.
    pub fn from_payloads(geometry: &str, animation: &str) -> Result<Self, PayloadError> {
        let geometry = GeometryPayload::parse(geometry)?;
        let animation = AnimationPayload::parse(animation)?;
        Self::from_parsed(&geometry, &animation)
    }

    pub fn from_parsed(
        geometry: &GeometryPayload,
        animation: &AnimationPayload,
    ) -> Result<Self, PayloadError> {
        check_joint_count("inverse bind poses", animation.inverse_bind_poses.len())?;
        if !geometry.joint_name_position_index.is_empty() {
            check_joint_count(
                "geometry joint names",
                geometry.joint_name_position_index.len(),
            )?;
        }
        warn_on_joint_order_mismatch(geometry, animation);

        let inverse_bind_matrices: Vec<Mat4> = animation
            .inverse_bind_poses
            .iter()
            .map(Mat4::from_cols_array)
            .collect();

        let mut actions = KeyframeStore::default();
        for (name, keyframes) in &animation.actions {
            actions.insert(convert_action(name, keyframes, &inverse_bind_matrices)?);
        }

        let vertex_data = VertexData::expand(geometry)?;
        debug!(
            "Scene built: {} vertices, {} indices, {} actions",
            vertex_data.vertex_count(),
            vertex_data.index_count(),
            actions.len()
        );

        Ok(Self {
            vertex_data,
            actions,
            skin: SkinAsset {
                joint_names: joint_names(geometry, animation),
                inverse_bind_matrices,
            },
        })
    }

    pub fn index_count(&self) -> u32 {
        self.vertex_data.index_count()
    }
}

fn check_joint_count(what: &'static str, found: usize) -> Result<(), PayloadError> {
    if found == JOINT_COUNT {
        Ok(())
    } else {
        Err(PayloadError::JointCount {
            what,
            expected: JOINT_COUNT,
            found,
        })
    }
}

/// Exported order is authoritative; the name tables only get compared.
fn warn_on_joint_order_mismatch(geometry: &GeometryPayload, animation: &AnimationPayload) {
    for (name, index) in &geometry.joint_name_position_index {
        let animation_index = animation
            .joint_name_indices
            .get(name)
            .or_else(|| animation.joint_name_indices.get(&normalize_joint_name(name)));
        if let Some(animation_index) = animation_index {
            if animation_index != index {
                warn!(
                    "Joint {} is #{} in geometry but #{} in animation, using exported order",
                    name, index, animation_index
                );
            }
        }
    }
}

fn joint_names(geometry: &GeometryPayload, animation: &AnimationPayload) -> Vec<String> {
    let table = if animation.joint_name_indices.is_empty() {
        &geometry.joint_name_position_index
    } else {
        &animation.joint_name_indices
    };
    let mut names = vec![String::new(); JOINT_COUNT];
    for (name, index) in table {
        if let Some(slot) = names.get_mut(*index) {
            slot.clone_from(name);
        }
    }
    names
}

fn convert_action(
    name: &str,
    keyframes: &BTreeMap<String, Vec<[f32; 16]>>,
    inverse_bind_matrices: &[Mat4],
) -> Result<Action, PayloadError> {
    let mut converted = Vec::with_capacity(keyframes.len());
    for (time_text, matrices) in keyframes {
        let time: f32 = time_text
            .trim()
            .parse()
            .ok()
            .filter(|time: &f32| time.is_finite())
            .ok_or_else(|| PayloadError::KeyframeTime {
                action: name.to_string(),
                time: time_text.clone(),
            })?;
        check_joint_count("keyframe pose", matrices.len())?;
        let pose = matrices
            .iter()
            .zip(inverse_bind_matrices)
            .map(|(matrix, inverse_bind)| {
                // Exported row-major: compose, then transpose into column-major.
                let matrix = (*inverse_bind * Mat4::from_cols_array(matrix)).transpose();
                DualQuat::from_rigid_mat4(&matrix)
            })
            .collect();
        converted.push(Keyframe { time, pose });
    }

    // Keys sort as strings, so "10" lands before "2".
    converted.sort_by(|a, b| a.time.total_cmp(&b.time));
    if let Some(pair) = converted.windows(2).find(|pair| pair[0].time == pair[1].time) {
        return Err(PayloadError::DuplicateKeyframe {
            action: name.to_string(),
            time: pair[0].time,
        });
    }
    Ok(Action::new(name, converted))
}
