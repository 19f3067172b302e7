//! Arc-length path sampling and segment placement.
//!
//! A [`PathSampler`] turns a moving head into evenly spaced samples; a
//! [`SegmentSpawner`] lays pooled segments along them with parallel
//! transported orientation. [`TrackPipeline`] drives both in order.

mod bridge;
mod config;
mod pipeline;
mod pool;
mod sampler;
mod spawner;

pub use bridge::bridge_between;
pub use config::{
    AnchorTemplate, ConfigError, SamplerParams, SpawnerParams, StartParams, TrackConfig,
};
pub use pipeline::{Countdown, TickReport, TrackPipeline};
pub use pool::{Bridge, Segment, SegmentId, SegmentPool};
pub use sampler::{PathSampler, Sample, SampleOutcome};
pub use spawner::{curvature_clamped_length, DeferReason, SegmentSpawner, SpawnReport};
