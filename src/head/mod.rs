//! Reference head motion feeding the track pipeline.
//!
//! A [`SnakeHead`] weaves forward along two sine waves; a [`PatternCycler`]
//! blends its wave parameters between presets over time.

mod motion;
mod pattern;

pub use motion::{HeadParams, SnakeHead};
pub use pattern::{CyclePhase, CyclerParams, PatternCycler, PatternPreset};
