use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use super::constants::EPSILON;

/// 3D vector with f32 components.
/// C-compatible layout for FFI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Float3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Float3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    pub const DOWN: Self = Self::new(0.0, -1.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);
    pub const BACK: Self = Self::new(0.0, 0.0, -1.0);

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn magnitude_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Returns the unit vector, or `ZERO` when the input is too short to
    /// have a direction. Callers that need a direction must check for that.
    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag < EPSILON {
            return Self::ZERO;
        }
        self * (1.0 / mag)
    }

    pub fn is_near_zero(self) -> bool {
        self.magnitude() < EPSILON
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).magnitude()
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    /// Unsigned angle between two directions in radians.
    ///
    /// Uses `atan2(|a x b|, a . b)`, which stays accurate for nearly
    /// parallel and nearly opposite vectors where `acos` does not.
    pub fn angle_between(self, other: Self) -> f32 {
        let cross = self.cross(other).magnitude();
        let dot = self.dot(other);
        if cross < EPSILON && dot.abs() < EPSILON {
            return 0.0;
        }
        cross.atan2(dot)
    }

    /// Any unit vector perpendicular to `self`.
    pub fn any_perpendicular(self) -> Self {
        let candidate = self.cross(Self::RIGHT);
        if candidate.magnitude_squared() > 1e-6 {
            return candidate.normalize();
        }
        self.cross(Self::FORWARD).normalize()
    }

    /// Spherical interpolation between two directions.
    ///
    /// Both inputs are treated as directions; the result is unit length.
    /// Opposite inputs rotate around an arbitrary perpendicular axis.
    pub fn slerp(self, other: Self, t: f32) -> Self {
        let a = self.normalize();
        let b = other.normalize();
        if a.is_near_zero() {
            return b;
        }
        if b.is_near_zero() {
            return a;
        }

        let dot = a.dot(b).clamp(-1.0, 1.0);
        if dot > 0.9995 {
            return a.lerp(b, t).normalize();
        }

        let theta = a.angle_between(b);
        if dot < -0.9995 {
            let axis = a.any_perpendicular();
            return Quaternion::from_axis_angle(axis, theta * t)
                .mul_vec(a)
                .normalize();
        }

        let sin_theta = theta.sin();
        let wa = ((1.0 - t) * theta).sin() / sin_theta;
        let wb = (t * theta).sin() / sin_theta;
        (a * wa + b * wb).normalize()
    }

    /// Rotates direction `self` toward `target` by at most `max_radians`.
    ///
    /// Returns `target` (normalized) once it is within reach.
    pub fn rotate_towards(self, target: Self, max_radians: f32) -> Self {
        let from = self.normalize();
        let to = target.normalize();
        if from.is_near_zero() {
            return to;
        }
        if to.is_near_zero() {
            return from;
        }

        let angle = from.angle_between(to);
        if angle <= max_radians || angle < EPSILON {
            return to;
        }
        from.slerp(to, max_radians / angle)
    }
}

impl Add for Float3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl AddAssign for Float3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Float3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Float3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Div<f32> for Float3 {
    type Output = Self;
    fn div(self, scalar: f32) -> Self {
        Self::new(self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

impl Neg for Float3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Default for Float3 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Unit quaternion for 3D rotations.
/// C-compatible layout for FFI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub fn from_axis_angle(axis: Float3, angle: f32) -> Self {
        let half_angle = angle * 0.5;
        let s = half_angle.sin();
        let c = half_angle.cos();
        let normalized = axis.normalize();

        Self::new(normalized.x * s, normalized.y * s, normalized.z * s, c)
    }

    /// Builds the rotation whose local x/y/z axes map to the given
    /// orthonormal columns.
    pub fn from_basis(x_axis: Float3, y_axis: Float3, z_axis: Float3) -> Self {
        let (m00, m01, m02) = (x_axis.x, y_axis.x, z_axis.x);
        let (m10, m11, m12) = (x_axis.y, y_axis.y, z_axis.y);
        let (m20, m21, m22) = (x_axis.z, y_axis.z, z_axis.z);

        let trace = m00 + m11 + m22;
        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new((m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s, 0.25 * s)
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Self::new(0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s)
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Self::new((m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s)
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Self::new((m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s)
        };
        q.normalize()
    }

    pub fn normalize(self) -> Self {
        let mag = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if mag < EPSILON {
            return Self::IDENTITY;
        }
        Self::new(self.x / mag, self.y / mag, self.z / mag, self.w / mag)
    }

    pub fn mul_vec(self, v: Float3) -> Float3 {
        let qv = Float3::new(self.x, self.y, self.z);
        let uv = qv.cross(v);
        let uuv = qv.cross(uv);
        v + (uv * (2.0 * self.w)) + (uuv * 2.0)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}
