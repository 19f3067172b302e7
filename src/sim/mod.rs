//! Pure math primitives for track framing.
//!
//! This module contains zero-dependency core types: vectors, rotations,
//! orthonormal frames, poses, and parallel transport.

mod frame;
mod math;
mod pose;

pub mod constants;
pub mod transport;

pub use constants::{DT, EPSILON, HZ, NO_ROLL_EPSILON, TRANSPORT_EPSILON, WORLD_UP};
pub use frame::Frame;
pub use math::{Float3, Quaternion};
pub use pose::Pose;
pub use transport::{no_roll_up, transport_up};
