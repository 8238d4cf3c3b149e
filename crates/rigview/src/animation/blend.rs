use rigview_asset::{animation::Action, dualquat::DualQuat, skin::JOINT_COUNT};

/// One rigid transform per joint, in exported joint order.
pub type Pose = [DualQuat; JOINT_COUNT];

/// An action sampled at a time relative to its own start.
#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
    pub action: Option<&'a Action>,
    pub time: f32,
}

/// Weight of the outgoing action, `elapsed` seconds into a crossfade.
///
/// Starts at 1 and falls linearly to 0 at `duration`.
pub fn crossfade_weight(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    1.0 - (elapsed / duration).clamp(0.0, 1.0)
}

/// Interpolates between the two keyframes around the layer time.
///
/// The result is not normalized. A missing action, or one without
/// keyframes, yields the identity pose.
pub fn sample(layer: Layer<'_>) -> Pose {
    let mut pose = [DualQuat::IDENTITY; JOINT_COUNT];
    let Some(bracket) = layer.action.and_then(|action| action.bracket(layer.time)) else {
        return pose;
    };
    for (joint, out) in pose.iter_mut().enumerate() {
        let from = bracket.from.pose.get(joint).copied().unwrap_or_default();
        let to = bracket.to.pose.get(joint).copied().unwrap_or_default();
        *out = from.lerp(&to, bracket.progress);
    }
    pose
}

/// Blends the current layer with an optional outgoing one and normalizes.
///
/// `previous` carries the outgoing layer and its crossfade weight.
pub fn blend(current: Layer<'_>, previous: Option<(Layer<'_>, f32)>) -> Pose {
    let mut pose = sample(current);
    if let Some((layer, weight)) = previous {
        if weight > 0.0 {
            let outgoing = sample(layer);
            for (joint, outgoing) in pose.iter_mut().zip(outgoing.iter()) {
                *joint = joint.lerp(outgoing, weight);
            }
        }
    }
    for joint in pose.iter_mut() {
        *joint = joint.normalize();
    }
    pose
}
