use crate::sim::{Float3, Frame, Pose};

use super::pool::Bridge;

/// Connector from the older segment's tail anchor to the newer segment's head anchor.
///
/// The strip sits at the anchors' midpoint, looks along tail -> head with the
/// newer segment's up, and is as long as the anchor distance (at least
/// `min_length`). Coincident anchors fall back to the newer segment's forward.
pub fn bridge_between(prev_tail: Float3, next_head: Float3, next_pose: &Pose, min_length: f32) -> Bridge {
    let delta = next_head - prev_tail;
    let distance = delta.magnitude();

    let direction = match delta.normalize() {
        d if d.is_near_zero() => next_pose.forward(),
        d => d,
    };
    let frame = Frame::look_with_fallback(direction, next_pose.up(), next_pose.forward());

    Bridge {
        pose: Pose::from_frame((prev_tail + next_head) * 0.5, frame),
        length: distance.max(min_length),
    }
}
