use super::frame::Frame;
use super::math::{Float3, Quaternion};

/// Position plus orientation of a placed object.
/// C-compatible layout for FFI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub position: Float3,
    pub rotation: Quaternion,
}

impl Pose {
    pub const fn new(position: Float3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    pub fn from_frame(position: Float3, frame: Frame) -> Self {
        Self::new(position, frame.to_quaternion())
    }

    pub fn frame(&self) -> Frame {
        Frame::from_quaternion(self.rotation)
    }

    pub fn forward(&self) -> Float3 {
        self.rotation.mul_vec(Float3::FORWARD)
    }

    pub fn up(&self) -> Float3 {
        self.rotation.mul_vec(Float3::UP)
    }

    /// Maps a point from local space (x right, y up, z forward) into world space.
    pub fn transform_point(&self, local: Float3) -> Float3 {
        self.position + self.rotation.mul_vec(local)
    }

    pub fn translated(&self, offset: Float3) -> Self {
        Self::new(self.position + offset, self.rotation)
    }

    pub const IDENTITY: Self = Self::new(Float3::ZERO, Quaternion::IDENTITY);
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}
