//! Parallel transport of an up vector along a sequence of tangents.

use super::constants::{TRANSPORT_EPSILON, WORLD_UP};
use super::frame::Frame;
use super::math::{Float3, Quaternion};

/// Carries `up_prev` from `tangent_from` to `tangent_to` without adding twist.
///
/// The rotation taking `tangent_from` onto `tangent_to` (axis = normalized
/// cross product, angle = `atan2(|cross|, dot)`) is applied to `up_prev`
/// (Rodrigues rotation). Nearly parallel tangents leave `up_prev` unchanged.
pub fn transport_up(up_prev: Float3, tangent_from: Float3, tangent_to: Float3) -> Float3 {
    let t0 = tangent_from.normalize();
    let t1 = tangent_to.normalize();

    let cross = t0.cross(t1);
    let s = cross.magnitude();
    if s < TRANSPORT_EPSILON {
        return up_prev;
    }

    let c = t0.dot(t1);
    let angle = s.atan2(c);
    let axis = cross / s;
    Quaternion::from_axis_angle(axis, angle).mul_vec(up_prev)
}

/// Up vector with no roll for `forward`: world up projected off the tangent.
///
/// Falls back to `fallback_up` (typically the transported up) when forward is
/// nearly vertical, and to any perpendicular when that is degenerate too.
pub fn no_roll_up(forward: Float3, fallback_up: Float3) -> Float3 {
    Frame::look_with_fallback(forward, WORLD_UP, fallback_up).normal
}
