//! GLSL sources for dual quaternion skinning.
//!
//! The vertex stage blends the four joint influences of a vertex, renormalizes
//! and rebuilds a rigid matrix with the same arithmetic as
//! [`DualQuat::to_mat4`]. Models come out of Blender z-up, the shader swaps
//! them into y-up. [`skin_vertex`] runs the same stage on the CPU.
use glam::{Vec3, Vec4};
use rigview_asset::{dualquat::DualQuat, skin::JOINT_COUNT};

use crate::animation::blend::Pose;

use super::backend::SkinnedVertex;

pub const POSITION_ATTRIBUTE: &str = "aVertexPosition";
pub const NORMAL_ATTRIBUTE: &str = "aVertexNormal";
pub const UV_ATTRIBUTE: &str = "aVertexUV";
pub const JOINT_INDEX_ATTRIBUTE: &str = "aJointIndex";
pub const JOINT_WEIGHT_ATTRIBUTE: &str = "aJointWeight";

pub const MODEL_VIEW_UNIFORM: &str = "uMVMatrix";
pub const PROJECTION_UNIFORM: &str = "uPMatrix";
pub const NORMAL_MATRIX_UNIFORM: &str = "uNMatrix";
pub const LIGHT_POSITION_UNIFORM: &str = "uLightPos";
pub const CAMERA_POSITION_UNIFORM: &str = "uCameraPos";
pub const JOINT_ROTATIONS_UNIFORM: &str = "boneRotQuaternions";
pub const JOINT_TRANSLATIONS_UNIFORM: &str = "boneTransQuaternions";

/// Attribute names in [`SkinnedVertex`] field order.
pub const ATTRIBUTES: [&str; 5] = [
    POSITION_ATTRIBUTE,
    NORMAL_ATTRIBUTE,
    UV_ATTRIBUTE,
    JOINT_INDEX_ATTRIBUTE,
    JOINT_WEIGHT_ATTRIBUTE,
];

pub fn vertex_source() -> String {
    format!(
        r#"attribute vec3 {position};
attribute vec3 {normal};
attribute vec2 {uv};
attribute vec4 {joint_index};
attribute vec4 {joint_weight};

uniform mat4 {model_view};
uniform mat4 {projection};
uniform mat3 {normal_matrix};

uniform vec4 {rotations}[{joints}];
uniform vec4 {translations}[{joints}];

varying vec3 vNormal;
varying vec2 vUV;
varying vec3 vWorldSpacePos;

void main (void) {{
  vec4 rot = {rotations}[int({joint_index}.x)] * {joint_weight}.x +
    {rotations}[int({joint_index}.y)] * {joint_weight}.y +
    {rotations}[int({joint_index}.z)] * {joint_weight}.z +
    {rotations}[int({joint_index}.w)] * {joint_weight}.w;
  vec4 trans = {translations}[int({joint_index}.x)] * {joint_weight}.x +
    {translations}[int({joint_index}.y)] * {joint_weight}.y +
    {translations}[int({joint_index}.z)] * {joint_weight}.z +
    {translations}[int({joint_index}.w)] * {joint_weight}.w;

  float magnitude = length(rot);
  rot = rot / magnitude;
  trans = trans / magnitude;

  float xR = rot.x;
  float yR = rot.y;
  float zR = rot.z;
  float wR = rot.w;
  float xT = trans.x;
  float yT = trans.y;
  float zT = trans.z;
  float wT = trans.w;

  float t0 = 2.0 * (-wT * xR + xT * wR - yT * zR + zT * yR);
  float t1 = 2.0 * (-wT * yR + xT * zR + yT * wR - zT * xR);
  float t2 = 2.0 * (-wT * zR - xT * yR + yT * xR + zT * wR);

  mat4 skin = mat4(
    1.0 - 2.0 * yR * yR - 2.0 * zR * zR, 2.0 * xR * yR + 2.0 * wR * zR, 2.0 * xR * zR - 2.0 * wR * yR, 0.0,
    2.0 * xR * yR - 2.0 * wR * zR, 1.0 - 2.0 * xR * xR - 2.0 * zR * zR, 2.0 * yR * zR + 2.0 * wR * xR, 0.0,
    2.0 * xR * zR + 2.0 * wR * yR, 2.0 * yR * zR - 2.0 * wR * xR, 1.0 - 2.0 * xR * xR - 2.0 * yR * yR, 0.0,
    t0, t1, t2, 1.0
  );

  // Rigid transform, no inverse transpose needed for the normal.
  vec3 skinnedNormal = (skin * vec4({normal}, 0.0)).xyz;
  skinnedNormal = vec3(skinnedNormal.x, skinnedNormal.z, -skinnedNormal.y);

  vec4 worldPos = skin * vec4({position}, 1.0);
  worldPos = vec4(worldPos.x, worldPos.z, -worldPos.y, worldPos.w);

  gl_Position = {projection} * {model_view} * worldPos;

  vNormal = {normal_matrix} * skinnedNormal;
  vUV = {uv};
  vWorldSpacePos = worldPos.xyz;
}}
"#,
        position = POSITION_ATTRIBUTE,
        normal = NORMAL_ATTRIBUTE,
        uv = UV_ATTRIBUTE,
        joint_index = JOINT_INDEX_ATTRIBUTE,
        joint_weight = JOINT_WEIGHT_ATTRIBUTE,
        model_view = MODEL_VIEW_UNIFORM,
        projection = PROJECTION_UNIFORM,
        normal_matrix = NORMAL_MATRIX_UNIFORM,
        rotations = JOINT_ROTATIONS_UNIFORM,
        translations = JOINT_TRANSLATIONS_UNIFORM,
        joints = JOINT_COUNT,
    )
}

pub fn fragment_source() -> String {
    format!(
        r#"precision mediump float;

uniform vec3 {light};
uniform vec3 {camera};

varying vec3 vNormal;
varying vec3 vWorldSpacePos;

void main (void) {{
  vec3 ambient = vec3(0.24725, 0.1995, 0.0745);

  vec3 normal = normalize(vNormal);
  vec3 lightDir = normalize({light} - vWorldSpacePos);
  float diff = max(dot(normal, lightDir), 0.0);
  vec3 diffuse = diff * vec3(0.75164, 0.60648, 0.22648);

  float shininess = 0.4;
  vec3 viewDir = normalize({camera} - vWorldSpacePos);
  vec3 reflectDir = reflect(-lightDir, normal);
  float spec = pow(max(dot(viewDir, reflectDir), 0.0), 32.0);
  vec3 specular = shininess * spec * vec3(0.628281, 0.555802, 0.366065);

  gl_FragColor = vec4(ambient + diffuse + specular, 1.0);
}}
"#,
        light = LIGHT_POSITION_UNIFORM,
        camera = CAMERA_POSITION_UNIFORM,
    )
}

/// Blender is z-up, the viewer is y-up.
pub fn blender_to_view(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, -v.y)
}

/// World space position of `vertex` under `pose`, computed like the vertex
/// stage does.
pub fn skin_vertex(pose: &Pose, vertex: &SkinnedVertex) -> Vec3 {
    let mut real = Vec4::ZERO;
    let mut dual = Vec4::ZERO;
    for (joint, weight) in vertex.joint_indices.iter().zip(vertex.joint_weights) {
        let dq = pose
            .get(*joint as usize)
            .copied()
            .unwrap_or(DualQuat::IDENTITY);
        real += Vec4::from(dq.real) * weight;
        dual += Vec4::from(dq.dual) * weight;
    }
    let blended = DualQuat::from_array([
        real.x, real.y, real.z, real.w, dual.x, dual.y, dual.z, dual.w,
    ]);
    let skinned = blended
        .to_mat4()
        .transform_point3(Vec3::from_array(vertex.position));
    blender_to_view(skinned)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec3};
    use rigview_asset::{dualquat::DualQuat, skin::JOINT_COUNT};

    use crate::render::backend::SkinnedVertex;

    use super::{fragment_source, skin_vertex, vertex_source, ATTRIBUTES};

    #[test]
    fn vertex_source_sized_by_joint_count() {
        let source = vertex_source();
        assert!(source.contains(&format!("boneRotQuaternions[{}]", JOINT_COUNT)));
        assert!(source.contains(&format!("boneTransQuaternions[{}]", JOINT_COUNT)));
        for attribute in ATTRIBUTES {
            assert!(source.contains(&format!("{};", attribute)), "{}", attribute);
        }
        assert!(!source.contains("{{"));
    }

    #[test]
    fn fragment_source_declares_lighting_uniforms() {
        let source = fragment_source();
        assert!(source.contains("uniform vec3 uLightPos;"));
        assert!(source.contains("uniform vec3 uCameraPos;"));
    }

    fn vertex(joints: [f32; 4], weights: [f32; 4]) -> SkinnedVertex {
        SkinnedVertex {
            position: [1.0, 0.0, 0.0],
            joint_indices: joints,
            joint_weights: weights,
            ..Default::default()
        }
    }

    #[test]
    fn single_influence_moves_rigidly() {
        let mut pose = [DualQuat::IDENTITY; JOINT_COUNT];
        pose[2] = DualQuat::new(Quat::from_rotation_z(FRAC_PI_2), Vec3::new(0.0, 0.0, 2.0));
        let skinned = skin_vertex(&pose, &vertex([2.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]));
        // (1,0,0) -> rotated (0,1,0) -> translated (0,1,2) -> y-up (0,2,-1)
        assert!(skinned.abs_diff_eq(Vec3::new(0.0, 2.0, -1.0), 1.0e-5));
    }

    #[test]
    fn split_influence_stays_on_the_arc() {
        let mut pose = [DualQuat::IDENTITY; JOINT_COUNT];
        pose[1] = DualQuat::new(Quat::from_rotation_z(FRAC_PI_2), Vec3::ZERO);
        let skinned = skin_vertex(&pose, &vertex([0.0, 1.0, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0]));
        // Linear blending would shrink the point towards the origin.
        assert!((skinned.length() - 1.0).abs() < 1.0e-5);
    }
}
