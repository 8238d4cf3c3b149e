use std::collections::BTreeMap;

use crate::dualquat::DualQuat;

#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    /// One entry per joint, in exported joint order.
    pub pose: Vec<DualQuat>,
}

/// One animation clip. Keyframe times are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    name: String,
    keyframes: Vec<Keyframe>,
}

/// Two keyframes surrounding a playback time, and how far between them it is.
#[derive(Debug, Clone, Copy)]
pub struct Bracket<'a> {
    pub from: &'a Keyframe,
    pub to: &'a Keyframe,
    pub progress: f32,
}

impl Action {
    /// `keyframes` must already be sorted by strictly increasing time.
    pub fn new(name: impl Into<String>, keyframes: Vec<Keyframe>) -> Self {
        debug_assert!(keyframes.windows(2).all(|pair| pair[0].time < pair[1].time));
        Self {
            name: name.into(),
            keyframes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Fewer than two keyframes cannot be interpolated; such an action holds
    /// its pose.
    pub fn is_degenerate(&self) -> bool {
        self.keyframes.len() < 2
    }

    pub fn duration(&self) -> f32 {
        match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => 0.0,
        }
    }

    /// Maps a playback time onto the clip: clamps before the first keyframe,
    /// wraps at or past the last one.
    pub fn local_time(&self, time: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keyframes.first(), self.keyframes.last()) else {
            return 0.0;
        };
        let duration = self.duration();
        if time < first.time || duration <= 0.0 {
            first.time
        } else if time >= last.time {
            first.time + (time - first.time).rem_euclid(duration)
        } else {
            time
        }
    }

    /// Finds the keyframe pair around `time`. Returns `None` for an action
    /// without keyframes; a single keyframe brackets itself.
    pub fn bracket(&self, time: f32) -> Option<Bracket<'_>> {
        let first = self.keyframes.first()?;
        if self.is_degenerate() {
            return Some(Bracket {
                from: first,
                to: first,
                progress: 0.0,
            });
        }

        let time = self.local_time(time);
        let next = self
            .keyframes
            .partition_point(|keyframe| keyframe.time <= time)
            .clamp(1, self.keyframes.len() - 1);
        let from = &self.keyframes[next - 1];
        let to = &self.keyframes[next];
        let progress = ((time - from.time) / (to.time - from.time)).clamp(0.0, 1.0);
        Some(Bracket { from, to, progress })
    }
}

/// Every action of the loaded armature, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeStore {
    actions: BTreeMap<String, Action>,
}

impl KeyframeStore {
    pub fn insert(&mut self, action: Action) {
        self.actions.insert(action.name.clone(), action);
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    /// Sorted action names, without the `.001` copies some exporters emit
    /// next to the original action.
    pub fn selectable_names(&self) -> Vec<&str> {
        self.actions
            .keys()
            .map(String::as_str)
            .filter(|name| !name.contains("001"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::dualquat::DualQuat;

    use super::{Action, Keyframe, KeyframeStore};

    fn keyframe(time: f32) -> Keyframe {
        Keyframe {
            time,
            pose: vec![DualQuat::IDENTITY],
        }
    }

    fn walk() -> Action {
        Action::new("Walk", vec![keyframe(0.0), keyframe(0.5), keyframe(2.0)])
    }

    #[test]
    fn bracket_between_keyframes() {
        let action = walk();
        let bracket = action.bracket(1.25).unwrap();
        assert_eq!(bracket.from.time, 0.5);
        assert_eq!(bracket.to.time, 2.0);
        assert!((bracket.progress - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn bracket_on_keyframe_starts_there() {
        let action = walk();
        let bracket = action.bracket(0.5).unwrap();
        assert_eq!(bracket.from.time, 0.5);
        assert_eq!(bracket.progress, 0.0);
    }

    #[test]
    fn wraps_past_the_end() {
        let action = walk();
        assert_eq!(action.duration(), 2.0);
        assert_eq!(action.local_time(2.0), 0.0);
        assert!((action.local_time(2.75) - 0.75).abs() < 1.0e-6);
        assert!((action.local_time(4.75) - 0.75).abs() < 1.0e-6);
    }

    #[test]
    fn clamps_before_the_start() {
        let action = Action::new("Late", vec![keyframe(1.0), keyframe(2.0)]);
        assert_eq!(action.local_time(0.25), 1.0);
        let bracket = action.bracket(-3.0).unwrap();
        assert_eq!(bracket.from.time, 1.0);
        assert_eq!(bracket.progress, 0.0);
    }

    #[test]
    fn single_keyframe_holds() {
        let action = Action::new("Idle", vec![keyframe(0.3)]);
        assert!(action.is_degenerate());
        let bracket = action.bracket(17.0).unwrap();
        assert_eq!(bracket.from.time, 0.3);
        assert_eq!(bracket.to.time, 0.3);
        assert!(Action::new("Empty", Vec::new()).bracket(0.0).is_none());
    }

    #[test]
    fn duplicate_exports_are_not_selectable() {
        let mut store = KeyframeStore::default();
        store.insert(walk());
        store.insert(Action::new("Walk.001", vec![keyframe(0.0)]));
        store.insert(Action::new("Run", vec![keyframe(0.0)]));
        assert_eq!(store.len(), 3);
        assert_eq!(store.selectable_names(), vec!["Run", "Walk"]);
    }
}
