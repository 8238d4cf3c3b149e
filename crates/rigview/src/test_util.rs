use std::f32::consts::FRAC_PI_2;

use glam::Mat4;
use rigview_asset::{scene::SceneState, skin::JOINT_COUNT};
use serde_json::{json, Map, Value};

pub type Keyframes = Vec<(f32, Vec<[f32; 16]>)>;

/// Writes a matrix the way the actions exporter does, row by row.
pub fn row_major(matrix: Mat4) -> [f32; 16] {
    matrix.transpose().to_cols_array()
}

pub fn identity_pose() -> Vec<[f32; 16]> {
    vec![row_major(Mat4::IDENTITY); JOINT_COUNT]
}

pub fn pose_with_joint0(matrix: Mat4) -> Vec<[f32; 16]> {
    let mut pose = identity_pose();
    pose[0] = row_major(matrix);
    pose
}

/// Identity at 0s, joint 0 turned 90° around z at 1s.
pub fn walk_keyframes() -> Keyframes {
    vec![
        (0.0, identity_pose()),
        (1.0, pose_with_joint0(Mat4::from_rotation_z(FRAC_PI_2))),
    ]
}

pub fn scene_json(actions: &[(&str, Keyframes)]) -> (String, String) {
    let geometry = json!({
        "vertexPositions": [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        "vertexNormals": [0.0, 0.0, 1.0],
        "vertexUVs": [0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        "vertexPositionIndices": [0, 1, 2],
        "vertexNormalIndices": [0, 0, 0],
        "vertexUVIndices": [0, 1, 2],
        "vertexJointWeights": [{ "0": 1.0 }, { "0": 1.0 }, { "1": 1.0 }]
    });

    let mut action_map = Map::new();
    for (name, keyframes) in actions {
        let mut keyframe_map = Map::new();
        for (time, pose) in keyframes {
            keyframe_map.insert(time.to_string(), json!(pose));
        }
        action_map.insert(name.to_string(), Value::Object(keyframe_map));
    }
    let animation = json!({
        "inverseBindPoses": identity_pose(),
        "actions": action_map
    });
    (geometry.to_string(), animation.to_string())
}

pub fn scene(actions: &[(&str, Keyframes)]) -> SceneState {
    let (geometry, animation) = scene_json(actions);
    SceneState::from_payloads(&geometry, &animation).unwrap()
}
