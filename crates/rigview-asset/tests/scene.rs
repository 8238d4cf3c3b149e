use glam::{Quat, Vec3};
use rigview_asset::{error::PayloadError, scene::SceneState, skin::JOINT_COUNT};
use serde_json::{json, Value};

const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Row-major translation, the way the actions exporter writes it.
const TRANSLATE_123: [f32; 16] = [
    1.0, 0.0, 0.0, 1.0, //
    0.0, 1.0, 0.0, 2.0, //
    0.0, 0.0, 1.0, 3.0, //
    0.0, 0.0, 0.0, 1.0,
];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn geometry() -> String {
    json!({
        "vertexPositions": [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        "vertexNormals": [0.0, 0.0, 1.0],
        "vertexUVs": [0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        "vertexPositionIndices": [0, 1, 2],
        "vertexNormalIndices": [0, 0, 0],
        "vertexUVIndices": [0, 1, 2],
        "vertexJointWeights": [{ "0": 1.0 }, { "0": 0.5, "1": 0.5 }, { "1": 1.0 }]
    })
    .to_string()
}

fn pose(first: [f32; 16]) -> Vec<[f32; 16]> {
    let mut pose = vec![IDENTITY; JOINT_COUNT];
    pose[0] = first;
    pose
}

fn animation(keyframes: Value) -> String {
    json!({
        "inverseBindPoses": vec![IDENTITY; JOINT_COUNT],
        "actions": { "Walk": keyframes }
    })
    .to_string()
}

#[test]
fn builds_scene_from_payloads() {
    init_logger();
    let scene = SceneState::from_payloads(
        &geometry(),
        &animation(json!({ "0": pose(IDENTITY), "1": pose(TRANSLATE_123) })),
    )
    .unwrap();

    assert_eq!(scene.index_count(), 3);
    assert_eq!(scene.skin.joint_count(), JOINT_COUNT);
    assert_eq!(scene.vertex_data.joint_indices[1], [0, 1, 0, 0]);

    let walk = scene.actions.get("Walk").unwrap();
    let last = &walk.keyframes()[1];
    assert_eq!(last.time, 1.0);
    assert!(last.pose[0]
        .translation()
        .abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1.0e-5));
    assert!(last.pose[0].rotation().abs_diff_eq(Quat::IDENTITY, 1.0e-5));
    assert!(last.pose[1].translation().abs_diff_eq(Vec3::ZERO, 1.0e-6));
}

#[test]
fn keyframe_times_sort_numerically() {
    let scene = SceneState::from_payloads(
        &geometry(),
        &animation(json!({
            "10": pose(IDENTITY),
            "2": pose(IDENTITY),
            "0.5": pose(IDENTITY)
        })),
    )
    .unwrap();
    let times: Vec<f32> = scene
        .actions
        .get("Walk")
        .unwrap()
        .keyframes()
        .iter()
        .map(|k| k.time)
        .collect();
    assert_eq!(times, vec![0.5, 2.0, 10.0]);
}

#[test]
fn rejects_duplicate_keyframe_times() {
    let result = SceneState::from_payloads(
        &geometry(),
        &animation(json!({ "1": pose(IDENTITY), "1.0": pose(IDENTITY) })),
    );
    assert!(matches!(result, Err(PayloadError::DuplicateKeyframe { .. })));
}

#[test]
fn rejects_unparsable_keyframe_time() {
    let result =
        SceneState::from_payloads(&geometry(), &animation(json!({ "soon": pose(IDENTITY) })));
    assert!(matches!(
        result,
        Err(PayloadError::KeyframeTime { time, .. }) if time == "soon"
    ));
}

#[test]
fn rejects_wrong_joint_count() {
    let short_pose = vec![IDENTITY; JOINT_COUNT - 1];
    let result = SceneState::from_payloads(&geometry(), &animation(json!({ "0": short_pose })));
    assert!(matches!(
        result,
        Err(PayloadError::JointCount {
            what: "keyframe pose",
            found,
            ..
        }) if found == JOINT_COUNT - 1
    ));

    let animation = json!({ "inverseBindPoses": [IDENTITY], "actions": {} }).to_string();
    assert!(matches!(
        SceneState::from_payloads(&geometry(), &animation),
        Err(PayloadError::JointCount { what: "inverse bind poses", .. })
    ));
}

#[test]
fn rejects_broken_json() {
    let result = SceneState::from_payloads("{\"vertexPositions\": [", &animation(json!({})));
    assert!(matches!(result, Err(PayloadError::Json(_))));
}
