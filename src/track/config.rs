use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::Float3;

/// Construction-time configuration errors. Tick-time code never produces these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },
    #[error("{field} must be greater than zero (got {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must be within [{min}, {max}] (got {value})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be at least {min} (got {value})")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },
    #[error("segment_length {segment_length} must exceed min_segment_length {min_segment_length}")]
    SegmentShorterThanFloor {
        segment_length: f32,
        min_segment_length: f32,
    },
    #[error("sample history of {history} m cannot hold two segments of {segment_length} m")]
    HistoryTooShort { history: f64, segment_length: f32 },
    #[error("invalid track config: {0}")]
    Parse(String),
}

/// Path sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    /// Arc length between consecutive samples, in meters.
    pub sample_spacing: f32,
    /// Ring buffer capacity; the oldest sample is evicted beyond this.
    pub max_samples: usize,
    /// Time after a reset during which the seed sample absorbs jitter.
    pub warmup_seconds: f32,
    /// Per-tick displacement above which motion is treated as a jump.
    pub teleport_threshold: f32,
}

impl SamplerParams {
    pub fn new(
        sample_spacing: f32,
        max_samples: usize,
        warmup_seconds: f32,
        teleport_threshold: f32,
    ) -> Self {
        Self {
            sample_spacing,
            max_samples,
            warmup_seconds,
            teleport_threshold,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("sample_spacing", self.sample_spacing)?;
        at_least("max_samples", self.max_samples, 2)?;
        non_negative("warmup_seconds", self.warmup_seconds)?;
        positive("teleport_threshold", self.teleport_threshold)?;
        Ok(())
    }

    /// Total arc length the ring buffer can hold.
    pub fn history_length(&self) -> f64 {
        f64::from(self.sample_spacing) * self.max_samples as f64
    }
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            sample_spacing: 0.2,
            max_samples: 4096,
            warmup_seconds: 0.1,
            teleport_threshold: 5.0,
        }
    }
}

/// Local anchor points of a segment (x right, y up, z forward).
///
/// `head` is the seam point facing older track, `tail` the one facing newer
/// track. A bridge runs from the previous segment's tail to the next head.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorTemplate {
    pub head: [f32; 3],
    pub tail: [f32; 3],
    /// Floor for the bridge strip length so it never collapses to zero scale.
    pub bridge_min_length: f32,
}

impl AnchorTemplate {
    /// Anchors at both ends of a segment of `length`, centred on its origin.
    pub fn centered(length: f32) -> Self {
        let half = length * 0.5;
        Self {
            head: [0.0, 0.0, -half],
            tail: [0.0, 0.0, half],
            bridge_min_length: 0.001,
        }
    }

    pub fn head_offset(&self) -> Float3 {
        Float3::new(self.head[0], self.head[1], self.head[2])
    }

    pub fn tail_offset(&self) -> Float3 {
        Float3::new(self.tail[0], self.tail[1], self.tail[2])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, v) in [("anchors.head", self.head), ("anchors.tail", self.tail)] {
            if v.iter().any(|c| !c.is_finite()) {
                return Err(ConfigError::NotFinite { field });
            }
        }
        positive("anchors.bridge_min_length", self.bridge_min_length)
    }
}

impl Default for AnchorTemplate {
    fn default() -> Self {
        Self::centered(SpawnerParams::DEFAULT_SEGMENT_LENGTH)
    }
}

/// Segment placement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerParams {
    /// Nominal arc length covered by one segment.
    pub segment_length: f32,
    /// Floor applied when curvature shortens a segment.
    pub min_segment_length: f32,
    pub max_angle_per_segment_deg: f32,
    pub max_active_segments: usize,
    /// Slerp factor from the transported up toward world up, in `[0, 1]`.
    pub gravity_up_bias: f32,
    pub max_segments_per_frame: usize,
    pub initial_pool_size: usize,
    /// Explicit anchors; `None` centres them on a nominal-length segment.
    pub anchors: Option<AnchorTemplate>,
}

impl SpawnerParams {
    pub const DEFAULT_SEGMENT_LENGTH: f32 = 3.0;

    pub fn anchor_template(&self) -> AnchorTemplate {
        self.anchors
            .unwrap_or_else(|| AnchorTemplate::centered(self.segment_length))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("segment_length", self.segment_length)?;
        positive("min_segment_length", self.min_segment_length)?;
        if self.segment_length <= self.min_segment_length {
            return Err(ConfigError::SegmentShorterThanFloor {
                segment_length: self.segment_length,
                min_segment_length: self.min_segment_length,
            });
        }
        positive("max_angle_per_segment_deg", self.max_angle_per_segment_deg)?;
        at_least("max_active_segments", self.max_active_segments, 1)?;
        in_range("gravity_up_bias", self.gravity_up_bias, 0.0, 1.0)?;
        at_least("max_segments_per_frame", self.max_segments_per_frame, 1)?;
        if let Some(anchors) = &self.anchors {
            anchors.validate()?;
        }
        Ok(())
    }
}

impl Default for SpawnerParams {
    fn default() -> Self {
        Self {
            segment_length: Self::DEFAULT_SEGMENT_LENGTH,
            min_segment_length: 0.75,
            max_angle_per_segment_deg: 8.0,
            max_active_segments: 300,
            gravity_up_bias: 0.85,
            max_segments_per_frame: 64,
            initial_pool_size: 128,
            anchors: None,
        }
    }
}

/// Full pipeline configuration, supplied once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub sampler: SamplerParams,
    pub spawner: SpawnerParams,
    pub start: StartParams,
}

/// When and where a vehicle may be placed after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartParams {
    pub spawn_delay_seconds: f32,
    /// Lift above the first segment, along world up.
    pub spawn_height: f32,
}

impl Default for StartParams {
    fn default() -> Self {
        Self {
            spawn_delay_seconds: 0.5,
            spawn_height: 8.0,
        }
    }
}

impl StartParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("start.spawn_delay_seconds", self.spawn_delay_seconds)?;
        if !self.spawn_height.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "start.spawn_height",
            });
        }
        Ok(())
    }
}

impl TrackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampler.validate()?;
        self.spawner.validate()?;
        self.start.validate()?;

        let history = self.sampler.history_length();
        if history < 2.0 * f64::from(self.spawner.segment_length) {
            return Err(ConfigError::HistoryTooShort {
                history,
                segment_length: self.spawner.segment_length,
            });
        }
        Ok(())
    }

    /// Parses a JSON config (missing fields take defaults) and validates it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            field,
            value: f64::from(value),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    in_range(field, value, 0.0, f32::MAX)
}

fn in_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min: f64::from(min),
            max: f64::from(max),
            value: f64::from(value),
        })
    }
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { field, min, value })
    }
}
