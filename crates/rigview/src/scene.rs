use std::sync::{Arc, PoisonError, RwLock};

use log::{info, warn};
use rigview_asset::{error::PayloadError, scene::SceneState};
use rigview_protocol::message::ReloadMessage;

#[derive(Debug, Default)]
struct Live {
    version: u64,
    scene: Option<Arc<SceneState>>,
}

/// The live scene of one client.
///
/// Writers replace the whole scene; readers clone the `Arc` and keep a
/// consistent snapshot for as long as they hold it.
#[derive(Debug, Default)]
pub struct SceneSlot {
    live: RwLock<Live>,
}

impl SceneSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the live scene, returning its version.
    pub fn publish(&self, scene: SceneState) -> u64 {
        let scene = Arc::new(scene);
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        live.version += 1;
        live.scene = Some(scene);
        live.version
    }

    /// Decodes a reload and publishes it. A reload that fails to decode
    /// leaves the current scene live.
    pub fn apply_reload(&self, message: &ReloadMessage) -> Result<u64, PayloadError> {
        let scene = match SceneState::from_payloads(&message.model_data, &message.action_data) {
            Ok(scene) => scene,
            Err(err) => {
                warn!("Ignoring reload: {}", err);
                return Err(err);
            }
        };
        let actions = scene.actions.len();
        let version = self.publish(scene);
        info!("Scene {} live with {} actions", version, actions);
        Ok(version)
    }

    pub fn snapshot(&self) -> Option<(u64, Arc<SceneState>)> {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        live.scene.clone().map(|scene| (live.version, scene))
    }

    pub fn version(&self) -> u64 {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }
}
