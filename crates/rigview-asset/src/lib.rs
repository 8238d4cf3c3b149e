//! Provide asset handling for rigview.
//!
//! This library turns the two JSON payloads produced by the external export
//! chain (geometry and animation) into a [`scene::SceneState`]: expanded
//! vertex buffers, per-action keyframes encoded as dual quaternions, and the
//! inverse bind matrices of the skin. Both the server (to validate a reload
//! before publishing it) and the render client (to build the live scene) use
//! the same construction path.
//!
pub mod animation;
pub mod dualquat;
pub mod error;
pub mod mesh;
/// Serde schemas of the exporter outputs
pub mod payload;
pub mod scene;
pub mod skin;
