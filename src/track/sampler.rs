use std::collections::VecDeque;

use log::{debug, trace};

use crate::sim::Float3;

use super::config::{ConfigError, SamplerParams};

/// One point of the recorded path.
/// C-compatible layout for FFI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sample {
    pub position: Float3,
    /// Unit direction of travel at this sample.
    pub tangent: Float3,
    /// Cumulative arc length since the last reset.
    pub s: f64,
}

impl Sample {
    pub const fn new(position: Float3, tangent: Float3, s: f64) -> Self {
        Self {
            position,
            tangent,
            s,
        }
    }
}

/// What a single [`PathSampler::tick`] did.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SampleOutcome {
    /// Still absorbing start-up jitter; arc length unchanged.
    WarmingUp,
    /// Warm-up elapsed this tick; sampling starts next tick.
    Armed,
    /// Normal motion; `appended` samples were recorded.
    Sampled { appended: usize },
    /// Displacement exceeded the teleport threshold; the last sample was
    /// moved in place and arc length did not advance.
    TeleportRejected { distance: f32 },
}

/// Arc-length indexed record of a moving point.
///
/// Samples are spaced exactly `sample_spacing` apart in arc length and kept in
/// a bounded ring buffer (oldest evicted first). Only `tick` and `reset`
/// mutate the buffer.
#[derive(Debug, Clone)]
pub struct PathSampler {
    params: SamplerParams,
    samples: VecDeque<Sample>,
    /// Head position passed to the previous tick; the teleport guard
    /// measures against this.
    last_head_position: Float3,
    /// Position of the newest stepped sample; spacing is measured from here.
    last_recorded_position: Float3,
    last_tangent: Float3,
    last_arc_length: f64,
    warmup_remaining: f32,
    armed: bool,
}

impl PathSampler {
    pub fn new(
        params: SamplerParams,
        position: Float3,
        forward: Float3,
    ) -> Result<Self, ConfigError> {
        params.validate()?;

        let mut sampler = Self {
            params,
            samples: VecDeque::with_capacity(params.max_samples),
            last_head_position: position,
            last_recorded_position: position,
            last_tangent: Float3::FORWARD,
            last_arc_length: 0.0,
            warmup_remaining: params.warmup_seconds,
            armed: false,
        };
        sampler.reset(position, forward);
        Ok(sampler)
    }

    /// Clears history and re-seeds at `position`; arc length restarts at zero
    /// and warm-up is re-armed. Call whenever the head is relocated on purpose.
    pub fn reset(&mut self, position: Float3, forward: Float3) {
        let tangent = direction_or(forward, self.last_tangent);

        self.samples.clear();
        self.samples.push_back(Sample::new(position, tangent, 0.0));
        self.last_head_position = position;
        self.last_recorded_position = position;
        self.last_tangent = tangent;
        self.last_arc_length = 0.0;
        self.warmup_remaining = self.params.warmup_seconds;
        self.armed = false;
    }

    /// Records the head's motion for one simulation step.
    pub fn tick(&mut self, position: Float3, forward: Float3, dt: f32) -> SampleOutcome {
        let forward = direction_or(forward, self.last_tangent);

        if !self.armed {
            return self.tick_warmup(position, forward, dt);
        }

        let displacement = position.distance(self.last_head_position);
        if displacement > self.params.teleport_threshold {
            debug!(
                "Rejecting head jump of {displacement:.3} m (threshold {:.3} m) at s={:.3}",
                self.params.teleport_threshold, self.last_arc_length
            );
            self.overwrite_last(position, forward);
            return SampleOutcome::TeleportRejected {
                distance: displacement,
            };
        }

        self.last_head_position = position;

        let spacing = self.params.sample_spacing;
        let mut remaining = position.distance(self.last_recorded_position);
        let mut appended = 0;

        while remaining >= spacing {
            let dir = (position - self.last_recorded_position).normalize();
            if dir.is_near_zero() {
                break;
            }

            self.last_recorded_position += dir * spacing;
            self.last_arc_length += f64::from(spacing);
            self.last_tangent = dir;
            self.push(Sample::new(
                self.last_recorded_position,
                dir,
                self.last_arc_length,
            ));

            remaining -= spacing;
            appended += 1;
        }

        SampleOutcome::Sampled { appended }
    }

    fn tick_warmup(&mut self, position: Float3, forward: Float3, dt: f32) -> SampleOutcome {
        self.overwrite_last(position, forward);
        self.warmup_remaining -= dt;

        if self.warmup_remaining <= 0.0 {
            self.warmup_remaining = 0.0;
            self.armed = true;
            trace!("Path sampler armed at {position:?}");
            return SampleOutcome::Armed;
        }
        SampleOutcome::WarmingUp
    }

    fn overwrite_last(&mut self, position: Float3, tangent: Float3) {
        if let Some(last) = self.samples.back_mut() {
            last.position = position;
            last.tangent = tangent;
        }
        self.last_head_position = position;
        self.last_recorded_position = position;
        self.last_tangent = tangent;
    }

    fn push(&mut self, sample: Sample) {
        if self.samples.len() >= self.params.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn params(&self) -> &SamplerParams {
        &self.params
    }

    pub fn latest_arc_length(&self) -> f64 {
        self.last_arc_length
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Oldest-first iteration, for diagnostics drawing.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    /// Index range `(i_start, i_end)` bracketing `[s_start, s_end]`.
    ///
    /// `i_start` is the last sample at or before `s_start` and `i_end` the
    /// first sample at or after `s_end`, each clamped to the retained history.
    /// Returns `None` when fewer than two samples exist or `s_end <= 0`.
    pub fn span_by_arc_length(&self, s_start: f64, s_end: f64) -> Option<(usize, usize)> {
        let n = self.samples.len();
        if n < 2 || s_end <= 0.0 {
            return None;
        }

        let i_start = self
            .samples
            .partition_point(|sample| sample.s <= s_start)
            .saturating_sub(1)
            .min(n - 2);
        let i_end = self
            .samples
            .partition_point(|sample| sample.s < s_end)
            .clamp(i_start + 1, n - 1);

        Some((i_start, i_end))
    }

    /// Position at arc length `s`, interpolated between the two samples that
    /// bracket it within `[i_start, i_end]`. Clamps to the span's endpoints.
    pub fn position_at(&self, s: f64, i_start: usize, i_end: usize) -> Float3 {
        debug_assert!(i_start < i_end && i_end < self.samples.len());

        // Binary search for [lo, lo+1] with samples[lo].s <= s < samples[lo+1].s
        let mut lo = i_start;
        let mut hi = i_end;
        while lo < hi - 1 {
            let mid = (lo + hi) / 2;
            if self.samples[mid].s <= s {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let a = &self.samples[lo];
        let b = &self.samples[hi];
        let seg_len = b.s - a.s;
        let t = if seg_len > 0.0 {
            ((s - a.s) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };

        a.position.lerp(b.position, t as f32)
    }
}

/// Unit direction of `v`, or `fallback` when `v` has no usable direction.
fn direction_or(v: Float3, fallback: Float3) -> Float3 {
    match v.normalize() {
        d if d.is_near_zero() => fallback,
        d => d,
    }
}
