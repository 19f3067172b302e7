use super::constants::{NO_ROLL_EPSILON, WORLD_UP};
use super::math::{Float3, Quaternion};

/// Orthonormal coordinate frame for segment orientation.
///
/// Represents a right-handed coordinate system with three orthogonal unit vectors:
/// - `direction`: Forward direction along the track (tangent, local +z)
/// - `normal`: Upward direction perpendicular to the track (local +y)
/// - `lateral`: Rightward direction (local +x, `normal x direction`)
///
/// C-compatible layout for FFI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    pub direction: Float3,
    pub normal: Float3,
    pub lateral: Float3,
}

impl Frame {
    pub const fn new(direction: Float3, normal: Float3, lateral: Float3) -> Self {
        Self {
            direction,
            normal,
            lateral,
        }
    }

    /// Frame looking along `forward` with its normal as close to `up` as possible.
    pub fn look(forward: Float3, up: Float3) -> Self {
        Self::look_with_fallback(forward, up, WORLD_UP)
    }

    /// Like [`Frame::look`], but uses `fallback_up` when `up` is (nearly)
    /// parallel to `forward`, and any perpendicular if both are.
    /// A zero `forward` is treated as world forward.
    pub fn look_with_fallback(forward: Float3, up: Float3, fallback_up: Float3) -> Self {
        let dir = match forward.normalize() {
            d if d.is_near_zero() => Float3::FORWARD,
            d => d,
        };

        let normal = reject(up, dir)
            .or_else(|| reject(fallback_up, dir))
            .unwrap_or_else(|| dir.any_perpendicular());
        let lateral = normal.cross(dir).normalize();

        Self::new(dir, normal, lateral)
    }

    pub fn from_quaternion(q: Quaternion) -> Self {
        Self::new(
            q.mul_vec(Float3::FORWARD).normalize(),
            q.mul_vec(Float3::UP).normalize(),
            q.mul_vec(Float3::RIGHT).normalize(),
        )
    }

    pub fn to_quaternion(self) -> Quaternion {
        Quaternion::from_basis(self.lateral, self.normal, self.direction)
    }

    /// Rotates the frame around an arbitrary axis by the given angle.
    ///
    /// # Arguments
    /// * `axis` - Rotation axis (will be normalized)
    /// * `angle` - Rotation angle in radians
    pub fn rotate_around(self, axis: Float3, angle: f32) -> Self {
        let q = Quaternion::from_axis_angle(axis, angle);
        Self {
            direction: q.mul_vec(self.direction).normalize(),
            normal: q.mul_vec(self.normal).normalize(),
            lateral: q.mul_vec(self.lateral).normalize(),
        }
    }

    pub const DEFAULT: Self = Self::new(Float3::FORWARD, Float3::UP, Float3::RIGHT);
}

impl Default for Frame {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Component of `v` perpendicular to unit `dir`, normalized.
/// `None` when that component is too short to define a direction.
pub(crate) fn reject(v: Float3, dir: Float3) -> Option<Float3> {
    let projected = v - dir * dir.dot(v);
    if projected.magnitude() < NO_ROLL_EPSILON {
        None
    } else {
        Some(projected.normalize())
    }
}
