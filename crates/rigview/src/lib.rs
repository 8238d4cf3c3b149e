//! Render client for rigview.
//!
//! A [`client::Client`] keeps a websocket connection to the reload server
//! and drops every decoded reload into a [`scene::SceneSlot`]. Each frame the
//! [`render::render_loop::RenderLoop`] reads that slot, advances its
//! [`animation::player::AnimationPlayer`] and hands the blended joint
//! transforms to a [`render::backend::RenderBackend`].
pub mod animation;
pub mod client;
pub mod render;
pub mod scene;
pub mod transport;

pub use rigview_asset as asset;
pub use rigview_protocol as protocol;

#[cfg(test)]
mod test_util;
