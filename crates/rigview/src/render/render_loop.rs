use std::sync::Arc;

use log::{debug, info, warn};
use rigview_asset::scene::SceneState;
use web_time::Instant;

use crate::{
    animation::{blend::Pose, player::AnimationPlayer},
    scene::SceneSlot,
};

use super::{
    backend::{JointUniforms, MeshBuffers, RenderBackend},
    camera::OrbitCamera,
    texture::TextureLoader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Nothing drawn yet, the texture or the first scene is missing.
    Waiting,
    Drawn { indices: u32 },
}

/// Per-frame driver: reads the live scene, advances the player and feeds
/// the backend.
pub struct RenderLoop<B> {
    backend: B,
    scenes: Arc<SceneSlot>,
    scene: Option<(u64, Arc<SceneState>)>,
    player: AnimationPlayer,
    camera: OrbitCamera,
    texture: TextureLoader,
    texture_ready: bool,
    last_frame: Option<Instant>,
}

impl<B: RenderBackend> RenderLoop<B> {
    pub fn new(
        backend: B,
        scenes: Arc<SceneSlot>,
        player: AnimationPlayer,
        camera: OrbitCamera,
        texture: TextureLoader,
    ) -> Self {
        Self {
            backend,
            scenes,
            scene: None,
            player,
            camera,
            texture,
            texture_ready: false,
            last_frame: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn player(&self) -> &AnimationPlayer {
        &self.player
    }

    pub fn scene(&self) -> Option<&Arc<SceneState>> {
        self.scene.as_ref().map(|(_, scene)| scene)
    }

    /// Switches the playing action. Names the live scene does not have are
    /// refused; before the first scene arrives any name is accepted.
    pub fn select_action(&mut self, action: &str) -> bool {
        if let Some(scene) = self.scene() {
            if !scene.actions.contains(action) {
                warn!("Unknown action {}", action);
                return false;
            }
        }
        self.player.select_action(action)
    }

    /// Pose of the current frame, `None` before the first scene.
    pub fn pose(&self) -> Option<Pose> {
        self.scene().map(|scene| self.player.pose(&scene.actions))
    }

    pub fn frame(&mut self, now: Instant) -> Frame {
        let delta = self
            .last_frame
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.player.advance(delta);

        if let Some(image) = self.texture.poll() {
            self.backend.upload_texture(&image);
            self.texture_ready = true;
        }
        self.sync_scene();

        self.backend.clear();

        if !self.texture_ready {
            return Frame::Waiting;
        }
        let Some((_, scene)) = &self.scene else {
            return Frame::Waiting;
        };
        let indices = scene.index_count();
        if indices == 0 {
            return Frame::Waiting;
        }

        let pose = self.player.pose(&scene.actions);
        self.backend.set_joints(&JointUniforms::from_pose(&pose));
        self.backend.set_view(&self.camera.uniforms());
        self.backend.draw_indexed(indices);
        Frame::Drawn { indices }
    }

    fn sync_scene(&mut self) {
        let version = self.scenes.version();
        if matches!(&self.scene, Some((current, _)) if *current == version) {
            return;
        }
        let Some((version, scene)) = self.scenes.snapshot() else {
            return;
        };
        debug!("Uploading scene {}", version);
        self.backend
            .upload_mesh(&MeshBuffers::from_vertex_data(&scene.vertex_data));
        self.player.on_scene_changed(&scene.actions);
        info!(
            "Scene {} bound, actions: {}",
            version,
            scene.actions.selectable_names().join(", ")
        );
        self.scene = Some((version, scene));
    }
}
