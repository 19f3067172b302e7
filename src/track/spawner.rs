use std::collections::VecDeque;

use log::{debug, warn};

use crate::sim::{transport_up, Float3, Frame, Pose, WORLD_UP};

use super::bridge::bridge_between;
use super::config::{AnchorTemplate, ConfigError, SpawnerParams};
use super::pool::{Segment, SegmentId, SegmentPool};
use super::sampler::PathSampler;

/// Why spawning stopped early this tick. Not an error: the next tick retries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeferReason {
    /// The sampler could not resolve the nominal span yet.
    SpanUnavailable,
    /// The span could not be resolved after curvature shortening.
    ClampedSpanUnavailable,
}

/// What a single [`SegmentSpawner::tick`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SpawnReport {
    pub spawned: usize,
    /// Oldest segments returned to the pool to respect the active cap.
    pub recycled: usize,
    /// Segments shortened by the curvature clamp.
    pub clamped: usize,
    pub deferred: Option<DeferReason>,
    /// The per-tick cap stopped spawning while more segments were due.
    pub cap_hit: bool,
}

/// Length of a segment whose span turns by `angle_deg`.
///
/// Scales `segment_length` so the turn per segment stays near `max_angle_deg`,
/// clamped to `[min_segment_length, segment_length]`.
pub fn curvature_clamped_length(
    segment_length: f64,
    min_segment_length: f64,
    max_angle_deg: f64,
    angle_deg: f64,
) -> f64 {
    let scaled = segment_length * (max_angle_deg / angle_deg.max(0.01));
    scaled.clamp(min_segment_length, segment_length)
}

/// Lays segments along the sampled path at arc-length intervals.
///
/// Each tick spawns every segment whose end (`next_spawn_at_s`) the path has
/// reached, up to `max_segments_per_frame`. Orientation follows a parallel
/// transported up vector blended toward world up. The active window is FIFO
/// and bounded by `max_active_segments`.
#[derive(Debug, Clone)]
pub struct SegmentSpawner {
    params: SpawnerParams,
    anchors: AnchorTemplate,
    pool: SegmentPool,
    active: VecDeque<SegmentId>,
    next_spawn_at_s: f64,
    transported_up: Float3,
    last_tangent: Float3,
}

impl SegmentSpawner {
    pub fn new(params: SpawnerParams) -> Result<Self, ConfigError> {
        params.validate()?;

        Ok(Self {
            params,
            anchors: params.anchor_template(),
            pool: SegmentPool::new(params.initial_pool_size),
            active: VecDeque::with_capacity(params.max_active_segments + 1),
            next_spawn_at_s: f64::from(params.segment_length),
            transported_up: WORLD_UP,
            last_tangent: Float3::FORWARD,
        })
    }

    /// Releases every active segment and restarts placement at arc length
    /// `segment_length` with world up and `forward` as the transport state.
    pub fn reset(&mut self, forward: Float3) {
        let released = self.active.len();
        while let Some(id) = self.active.pop_front() {
            if !self.pool.release(id) {
                warn!("Active segment {id:?} was already back in the pool");
            }
        }

        self.next_spawn_at_s = f64::from(self.params.segment_length);
        self.transported_up = WORLD_UP;
        self.last_tangent = match forward.normalize() {
            d if d.is_near_zero() => Float3::FORWARD,
            d => d,
        };
        debug!("Segment spawner reset, released {released} segments");
    }

    /// Spawns every segment the sampler's path now covers.
    pub fn tick(&mut self, sampler: &PathSampler) -> SpawnReport {
        let latest = sampler.latest_arc_length();
        let mut report = SpawnReport::default();

        while latest >= self.next_spawn_at_s {
            if report.spawned >= self.params.max_segments_per_frame {
                report.cap_hit = true;
                break;
            }
            if let Err(reason) = self.spawn_next(sampler, &mut report) {
                debug!(
                    "Deferring spawn at s={:.3}: {reason:?}",
                    self.next_spawn_at_s
                );
                report.deferred = Some(reason);
                break;
            }
        }

        if report.cap_hit {
            warn!(
                "Spawned {} segments this tick, {:.2} m of track still pending",
                report.spawned,
                latest - self.next_spawn_at_s
            );
        }
        report
    }

    fn spawn_next(
        &mut self,
        sampler: &PathSampler,
        report: &mut SpawnReport,
    ) -> Result<(), DeferReason> {
        let nominal = f64::from(self.params.segment_length);
        let s_end = self.next_spawn_at_s;

        let (mut i_start, mut i_end) = sampler
            .span_by_arc_length(s_end - nominal, s_end)
            .ok_or(DeferReason::SpanUnavailable)?;

        let angle_deg = f64::from(
            tangent(sampler, i_start)
                .angle_between(tangent(sampler, i_end))
                .to_degrees(),
        );
        let max_angle = f64::from(self.params.max_angle_per_segment_deg);

        let mut length = nominal;
        if angle_deg > max_angle {
            length = curvature_clamped_length(
                nominal,
                f64::from(self.params.min_segment_length),
                max_angle,
                angle_deg,
            );
            (i_start, i_end) = sampler
                .span_by_arc_length(s_end - length, s_end)
                .ok_or(DeferReason::ClampedSpanUnavailable)?;
            report.clamped += 1;
            debug!("Turn of {angle_deg:.1} deg at s={s_end:.3}, segment shortened to {length:.3} m");
        }
        let s_start = s_end - length;

        let mid_position = sampler.position_at((s_start + s_end) * 0.5, i_start, i_end);
        let mid_tangent = match (tangent(sampler, i_start) + tangent(sampler, i_end)).normalize() {
            t if t.is_near_zero() => self.last_tangent,
            t => t,
        };

        self.transported_up = transport_up(self.transported_up, self.last_tangent, mid_tangent);
        self.last_tangent = mid_tangent;
        let blended_up = self
            .transported_up
            .slerp(WORLD_UP, self.params.gravity_up_bias);

        let frame = Frame::look_with_fallback(mid_tangent, blended_up, self.transported_up);
        let pose = Pose::from_frame(mid_position, frame);

        let prev_tail = self
            .active
            .back()
            .and_then(|&prev| self.pool.segment(prev))
            .map(|prev| prev.tail_anchor);

        let anchors = self.anchors;
        let id = self.pool.get();
        if let Some(segment) = self.pool.segment_mut(id) {
            segment.set_pose(pose, &anchors);
            segment.set_arc_range(s_start, s_end);
            let head = segment.head_anchor;
            segment.bridge = prev_tail
                .map(|tail| bridge_between(tail, head, &pose, anchors.bridge_min_length));
        }
        self.active.push_back(id);
        self.next_spawn_at_s += length;
        report.spawned += 1;

        if self.active.len() > self.params.max_active_segments {
            if let Some(oldest) = self.active.pop_front() {
                if self.pool.release(oldest) {
                    report.recycled += 1;
                } else {
                    warn!("Evicted segment {oldest:?} was already back in the pool");
                }
            }
        }
        Ok(())
    }

    pub fn params(&self) -> &SpawnerParams {
        &self.params
    }

    /// Arc length at which the next segment ends.
    pub fn next_spawn_at_s(&self) -> f64 {
        self.next_spawn_at_s
    }

    pub fn transported_up(&self) -> Float3 {
        self.transported_up
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn active_ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.active.iter().copied()
    }

    /// Active segments, oldest first.
    pub fn active(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.active.iter().filter_map(|&id| self.pool.segment(id))
    }

    pub fn oldest(&self) -> Option<&Segment> {
        self.active.front().and_then(|&id| self.pool.segment(id))
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.pool.segment(id)
    }

    pub fn pool(&self) -> &SegmentPool {
        &self.pool
    }
}

fn tangent(sampler: &PathSampler, index: usize) -> Float3 {
    sampler
        .sample(index)
        .map(|sample| sample.tangent)
        .unwrap_or(Float3::FORWARD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::config::SamplerParams;
    use crate::track::sampler::SampleOutcome;
    use approx::assert_relative_eq;

    const TOLERANCE: f64 = 1e-4;

    fn armed_sampler(spacing: f32) -> PathSampler {
        let params = SamplerParams::new(spacing, 4096, 0.0, 5.0);
        let mut sampler = PathSampler::new(params, Float3::ZERO, Float3::FORWARD).unwrap();
        assert_eq!(
            sampler.tick(Float3::ZERO, Float3::FORWARD, 0.0),
            SampleOutcome::Armed
        );
        sampler
    }

    fn drive(sampler: &mut PathSampler, from: Float3, step: Float3, ticks: usize) -> Float3 {
        let mut pos = from;
        for _ in 0..ticks {
            pos += step;
            sampler.tick(pos, step, 1.0 / 60.0);
        }
        pos
    }

    fn spawner(params: SpawnerParams) -> SegmentSpawner {
        SegmentSpawner::new(params).unwrap()
    }

    #[test]
    fn clamped_length_scales_with_turn() {
        assert_relative_eq!(curvature_clamped_length(3.0, 0.75, 8.0, 16.0), 1.5);
        assert_relative_eq!(curvature_clamped_length(3.0, 0.75, 8.0, 4.0), 3.0);
        assert_relative_eq!(curvature_clamped_length(3.0, 0.75, 8.0, 90.0), 0.75);
        assert_relative_eq!(curvature_clamped_length(3.0, 0.75, 8.0, 0.0), 3.0);
    }

    #[test]
    fn new_rejects_invalid_params() {
        let params = SpawnerParams {
            max_active_segments: 0,
            ..SpawnerParams::default()
        };
        assert!(SegmentSpawner::new(params).is_err());
    }

    #[test]
    fn nothing_spawns_before_first_segment_is_covered() {
        let mut sampler = armed_sampler(0.25);
        let mut spawner = spawner(SpawnerParams::default());

        drive(&mut sampler, Float3::ZERO, Float3::new(0.0, 0.0, 0.125), 20);
        let report = spawner.tick(&sampler);

        assert_eq!(report, SpawnReport::default());
        assert_relative_eq!(spawner.next_spawn_at_s(), 3.0);
    }

    #[test]
    fn straight_path_spawns_full_length_segments() {
        let mut sampler = armed_sampler(0.25);
        let mut spawner = spawner(SpawnerParams::default());

        drive(&mut sampler, Float3::ZERO, Float3::new(0.0, 0.0, 0.125), 96);
        let report = spawner.tick(&sampler);

        assert_eq!(report.spawned, 4);
        assert_eq!(report.clamped, 0);
        assert_eq!(report.deferred, None);
        assert_relative_eq!(spawner.next_spawn_at_s(), 15.0, epsilon = TOLERANCE);

        for (k, segment) in spawner.active().enumerate() {
            let start = 3.0 * k as f64;
            assert_relative_eq!(segment.arc_start, start, epsilon = TOLERANCE);
            assert_relative_eq!(f64::from(segment.length), 3.0, epsilon = TOLERANCE);
            assert_relative_eq!(segment.pose.position.z, start as f32 + 1.5, epsilon = 1e-4);
            assert_relative_eq!(segment.pose.forward().z, 1.0, epsilon = 1e-5);
            assert_relative_eq!(segment.pose.up().y, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn cursor_advances_by_sum_of_actual_lengths() {
        let mut sampler = armed_sampler(0.2);
        let mut spawner = spawner(SpawnerParams::default());

        // Quarter circle of radius 10 followed by a straight run.
        let radius = 10.0f32;
        let steps = 200;
        let mut prev = Float3::ZERO;
        for i in 1..=steps {
            let theta = std::f32::consts::FRAC_PI_2 * i as f32 / steps as f32;
            let pos = Float3::new(radius * (1.0 - theta.cos()), 0.0, radius * theta.sin());
            sampler.tick(pos, pos - prev, 1.0 / 60.0);
            prev = pos;
            spawner.tick(&sampler);
        }
        drive(&mut sampler, prev, Float3::new(0.1, 0.0, 0.0), 100);
        spawner.tick(&sampler);

        let segments: Vec<_> = spawner.active().cloned().collect();
        assert_relative_eq!(segments[0].arc_end, 3.0, epsilon = TOLERANCE);
        for pair in segments.windows(2) {
            let advance = f64::from(pair[0].length);
            assert_relative_eq!(pair[1].arc_end, pair[0].arc_end + advance, epsilon = TOLERANCE);
        }
        for segment in &segments {
            assert!(segment.length >= 0.75 - 1e-4 && segment.length <= 3.0 + 1e-4);
            assert_relative_eq!(
                segment.arc_end - segment.arc_start,
                f64::from(segment.length),
                epsilon = TOLERANCE
            );
        }

        let last = segments.last().unwrap();
        assert_relative_eq!(
            spawner.next_spawn_at_s(),
            last.arc_end + f64::from(last.length),
            epsilon = TOLERANCE
        );
        assert!(spawner.active().any(|s| s.length < 2.99));
    }

    #[test]
    fn first_clamped_length_matches_measured_turn() {
        let mut sampler = armed_sampler(0.2);
        let radius = 10.0f32;
        let mut prev = Float3::ZERO;
        for i in 1..=40 {
            let theta = 0.4 * i as f32 / 40.0;
            let pos = Float3::new(radius * (1.0 - theta.cos()), 0.0, radius * theta.sin());
            sampler.tick(pos, pos - prev, 1.0 / 60.0);
            prev = pos;
        }

        let (i_start, i_end) = sampler.span_by_arc_length(0.0, 3.0).unwrap();
        let angle = sampler
            .sample(i_start)
            .unwrap()
            .tangent
            .angle_between(sampler.sample(i_end).unwrap().tangent)
            .to_degrees();
        assert!(angle > 8.0);
        let expected = curvature_clamped_length(3.0, 0.75, 8.0, f64::from(angle));

        let mut spawner = spawner(SpawnerParams {
            max_segments_per_frame: 1,
            ..SpawnerParams::default()
        });
        let report = spawner.tick(&sampler);

        assert_eq!(report.clamped, 1);
        let first = spawner.oldest().unwrap();
        assert_relative_eq!(f64::from(first.length), expected, epsilon = TOLERANCE);
        assert_relative_eq!(spawner.next_spawn_at_s(), 3.0 + expected, epsilon = TOLERANCE);
    }

    #[test]
    fn sharp_turn_uses_min_segment_length() {
        let mut sampler = armed_sampler(0.2);
        let mut spawner = spawner(SpawnerParams::default());

        let end = drive(&mut sampler, Float3::ZERO, Float3::new(0.0, 0.0, 0.1), 15);
        drive(&mut sampler, end, Float3::new(0.1, 0.0, 0.0), 20);
        assert!(sampler.latest_arc_length() >= 3.0);

        let report = spawner.tick(&sampler);

        assert!(report.clamped >= 1);
        let first = spawner.oldest().unwrap();
        assert_relative_eq!(f64::from(first.length), 0.75, epsilon = TOLERANCE);
        assert_relative_eq!(first.arc_start, 2.25, epsilon = TOLERANCE);
        assert_eq!(report.spawned, 1);
        assert_relative_eq!(spawner.next_spawn_at_s(), 3.75, epsilon = TOLERANCE);
    }

    #[test]
    fn active_window_recycles_oldest_first() {
        let mut sampler = armed_sampler(0.25);
        let mut spawner = spawner(SpawnerParams {
            max_active_segments: 5,
            initial_pool_size: 2,
            ..SpawnerParams::default()
        });

        let mut pos = Float3::ZERO;
        let (mut spawned, mut recycled) = (0, 0);
        for _ in 0..40 {
            let before: Vec<_> = spawner.active_ids().collect();
            pos = drive(&mut sampler, pos, Float3::new(0.0, 0.0, 0.5), 4);
            let report = spawner.tick(&sampler);
            spawned += report.spawned;
            recycled += report.recycled;

            assert!(spawner.active_len() <= 5);
            for evicted in &before[..report.recycled] {
                assert!(spawner.pool().is_free(*evicted));
            }
            let starts: Vec<_> = spawner.active().map(|s| s.arc_start).collect();
            assert!(starts.windows(2).all(|w| w[0] < w[1]));
        }

        assert_eq!(spawner.active_len(), 5);
        assert_eq!(recycled, spawned - 5);
        assert!(spawner.pool().capacity() <= 6);
        assert_eq!(
            spawner.pool().capacity(),
            spawner.active_len() + spawner.pool().free_count()
        );
    }

    #[test]
    fn cap_limits_spawns_without_losing_track() {
        let mut sampler = armed_sampler(0.25);
        let mut spawner = spawner(SpawnerParams {
            max_segments_per_frame: 2,
            ..SpawnerParams::default()
        });

        drive(&mut sampler, Float3::ZERO, Float3::new(0.0, 0.0, 0.125), 240);
        assert_relative_eq!(sampler.latest_arc_length(), 30.0, epsilon = TOLERANCE);

        let report = spawner.tick(&sampler);
        assert_eq!(report.spawned, 2);
        assert!(report.cap_hit);
        assert_relative_eq!(spawner.next_spawn_at_s(), 9.0, epsilon = TOLERANCE);

        let mut total = report.spawned;
        for _ in 0..10 {
            total += spawner.tick(&sampler).spawned;
        }
        assert_eq!(total, 10);
        assert!(!spawner.tick(&sampler).cap_hit);
        assert_relative_eq!(spawner.next_spawn_at_s(), 33.0, epsilon = TOLERANCE);
    }

    #[test]
    fn cap_not_reported_when_exactly_caught_up() {
        let mut sampler = armed_sampler(0.25);
        let mut spawner = spawner(SpawnerParams {
            max_segments_per_frame: 2,
            ..SpawnerParams::default()
        });

        drive(&mut sampler, Float3::ZERO, Float3::new(0.0, 0.0, 0.125), 56);
        let report = spawner.tick(&sampler);

        assert_eq!(report.spawned, 2);
        assert!(!report.cap_hit);
    }

    #[test]
    fn bridges_connect_consecutive_segments() {
        let mut sampler = armed_sampler(0.25);
        let mut spawner = spawner(SpawnerParams {
            anchors: Some(AnchorTemplate::centered(2.0)),
            ..SpawnerParams::default()
        });

        drive(&mut sampler, Float3::ZERO, Float3::new(0.0, 0.0, 0.125), 72);
        spawner.tick(&sampler);

        let segments: Vec<_> = spawner.active().cloned().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].bridge, None);

        for pair in segments.windows(2) {
            let bridge = pair[1].bridge.unwrap();
            assert_relative_eq!(bridge.length, 1.0, epsilon = 1e-4);
            assert_relative_eq!(bridge.pose.position.z, pair[0].arc_end as f32, epsilon = 1e-4);
        }
    }

    #[test]
    fn full_gravity_bias_keeps_up_vertical_on_level_turns() {
        let mut sampler = armed_sampler(0.2);
        let mut spawner = spawner(SpawnerParams {
            gravity_up_bias: 1.0,
            ..SpawnerParams::default()
        });

        let radius = 15.0f32;
        let mut prev = Float3::ZERO;
        for i in 1..=300 {
            let theta = 1.5 * i as f32 / 300.0;
            let pos = Float3::new(radius * (1.0 - theta.cos()), 0.0, radius * theta.sin());
            sampler.tick(pos, pos - prev, 1.0 / 60.0);
            prev = pos;
            spawner.tick(&sampler);
        }

        assert!(spawner.active_len() > 3);
        for segment in spawner.active() {
            assert_relative_eq!(segment.pose.up().y, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn reset_releases_everything() {
        let mut sampler = armed_sampler(0.25);
        let mut spawner = spawner(SpawnerParams::default());

        drive(&mut sampler, Float3::ZERO, Float3::new(0.0, 0.0, 0.125), 96);
        spawner.tick(&sampler);
        assert!(spawner.active_len() > 0);

        spawner.reset(Float3::RIGHT);

        assert_eq!(spawner.active_len(), 0);
        assert_eq!(spawner.pool().free_count(), spawner.pool().capacity());
        assert_relative_eq!(spawner.next_spawn_at_s(), 3.0);
        assert_eq!(spawner.transported_up(), WORLD_UP);
    }
}
