use log::{debug, info};
use rigview_asset::animation::KeyframeStore;
use serde::{Deserialize, Serialize};

use super::blend::{blend, crossfade_weight, Layer, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Seconds over which the previous action fades out.
    pub crossfade: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self { crossfade: 0.2 }
    }
}

/// A cursor into an action: which one, and when on the player clock it
/// started.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub action: String,
    pub start_time: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Transition {
    previous: PlaybackState,
    started_at: f32,
}

/// Playback clock plus the current and, while crossfading, the previous
/// action.
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    clock: f32,
    current: PlaybackState,
    transition: Option<Transition>,
    config: PlayerConfig,
}

impl AnimationPlayer {
    pub fn new(action: impl Into<String>, config: PlayerConfig) -> Self {
        Self {
            clock: 0.0,
            current: PlaybackState {
                action: action.into(),
                start_time: 0.0,
            },
            transition: None,
            config,
        }
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn current(&self) -> &PlaybackState {
        &self.current
    }

    pub fn previous(&self) -> Option<&PlaybackState> {
        self.transition.as_ref().map(|transition| &transition.previous)
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn advance(&mut self, delta: f32) {
        self.clock += delta.max(0.0);
        if self.previous_weight() <= 0.0 && self.transition.take().is_some() {
            debug!("Crossfade into {} done", self.current.action);
        }
    }

    /// Current weight of the previous action, 0 when not crossfading.
    pub fn previous_weight(&self) -> f32 {
        match &self.transition {
            Some(transition) => {
                crossfade_weight(self.clock - transition.started_at, self.config.crossfade)
            }
            None => 0.0,
        }
    }

    /// Switches to `action`, fading the current one out. Selecting the
    /// action that already plays does nothing.
    pub fn select_action(&mut self, action: &str) -> bool {
        if self.current.action == action {
            return false;
        }
        let next = PlaybackState {
            action: action.to_string(),
            start_time: self.clock,
        };
        let previous = std::mem::replace(&mut self.current, next);
        info!("Switching from {} to {}", previous.action, action);
        self.transition = (self.config.crossfade > 0.0).then_some(Transition {
            previous,
            started_at: self.clock,
        });
        true
    }

    /// Rebinds to a freshly reloaded store. Playback keeps its action and
    /// start time; an action the new store lacks is replaced by the first
    /// selectable one.
    pub fn on_scene_changed(&mut self, actions: &KeyframeStore) {
        if let Some(transition) = &self.transition {
            if !actions.contains(&transition.previous.action) {
                self.transition = None;
            }
        }
        if actions.contains(&self.current.action) {
            return;
        }
        let Some(fallback) = actions.selectable_names().first().map(|name| name.to_string())
        else {
            debug!("Reloaded scene has no actions, holding pose");
            return;
        };
        info!(
            "Action {} is gone after reload, playing {}",
            self.current.action, fallback
        );
        self.current = PlaybackState {
            action: fallback,
            start_time: self.clock,
        };
        self.transition = None;
    }

    pub fn pose(&self, actions: &KeyframeStore) -> Pose {
        let current = Layer {
            action: actions.get(&self.current.action),
            time: self.clock - self.current.start_time,
        };
        let previous = self.transition.as_ref().map(|transition| {
            let layer = Layer {
                action: actions.get(&transition.previous.action),
                time: self.clock - transition.previous.start_time,
            };
            (layer, self.previous_weight())
        });
        blend(current, previous)
    }
}
