//! Snaketrack - procedural track laid behind a moving head.
//!
//! # Architecture
//!
//! Layered modules with strict inward-only dependencies:
//!
//! - **sim**: Math primitives (Float3, Quaternion, Frame, Pose, parallel transport)
//! - **track**: Path sampling, segment pool and spawner, pipeline driver
//! - **head**: Reference head motion and pattern cycling
//! - **ffi**: C FFI bindings (feature `ffi`)
//!
//! # Usage
//!
//! ```no_run
//! use snaketrack::{Float3, TrackConfig, TrackPipeline};
//!
//! let mut pipeline =
//!     TrackPipeline::new(TrackConfig::default(), Float3::ZERO, Float3::FORWARD).unwrap();
//! let report = pipeline.tick(Float3::new(0.0, 0.0, 0.5), Float3::FORWARD, 1.0 / 60.0);
//! println!("spawned {}", report.spawn.spawned);
//! ```
//!
//! For C/C#/Unity, build with `--features ffi`, link the cdylib and use `trk_*` functions.

pub mod head;
pub mod sim;
pub mod track;

#[cfg(feature = "ffi")]
pub mod ffi;

// Re-export commonly used types at crate root
pub use head::{PatternCycler, SnakeHead};
pub use sim::{Float3, Frame, Pose, Quaternion};
pub use track::{ConfigError, PathSampler, SegmentSpawner, TrackConfig, TrackPipeline};
