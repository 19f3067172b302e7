use log::info;

use crate::sim::{Float3, Pose, WORLD_UP};

use super::config::{ConfigError, TrackConfig};
use super::pool::Segment;
use super::sampler::{PathSampler, SampleOutcome};
use super::spawner::{SegmentSpawner, SpawnReport};

/// Simulated-time delay, advanced explicitly each tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Countdown {
    Pending { remaining: f32 },
    Elapsed,
}

impl Countdown {
    pub fn new(seconds: f32) -> Self {
        if seconds > 0.0 {
            Self::Pending { remaining: seconds }
        } else {
            Self::Elapsed
        }
    }

    /// Advances by `dt`; returns whether the delay has elapsed.
    pub fn tick(&mut self, dt: f32) -> bool {
        if let Self::Pending { remaining } = self {
            *remaining -= dt;
            if *remaining <= 0.0 {
                *self = Self::Elapsed;
            }
        }
        self.is_elapsed()
    }

    pub fn is_elapsed(&self) -> bool {
        matches!(self, Self::Elapsed)
    }
}

/// Result of one [`TrackPipeline::tick`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TickReport {
    pub sample: SampleOutcome,
    pub spawn: SpawnReport,
    /// Where to place a vehicle; reported once per reset.
    pub spawn_point: Option<Pose>,
}

/// Sampler and spawner driven in a fixed order from one head transform.
#[derive(Debug, Clone)]
pub struct TrackPipeline {
    config: TrackConfig,
    sampler: PathSampler,
    spawner: SegmentSpawner,
    spawn_delay: Countdown,
    spawn_reported: bool,
}

impl TrackPipeline {
    pub fn new(config: TrackConfig, position: Float3, forward: Float3) -> Result<Self, ConfigError> {
        config.validate()?;

        let sampler = PathSampler::new(config.sampler, position, forward)?;
        let mut spawner = SegmentSpawner::new(config.spawner)?;
        spawner.reset(forward);

        Ok(Self {
            config,
            sampler,
            spawner,
            spawn_delay: Countdown::new(config.start.spawn_delay_seconds),
            spawn_reported: false,
        })
    }

    /// Sample first, then spawn against the updated path.
    pub fn tick(&mut self, position: Float3, forward: Float3, dt: f32) -> TickReport {
        let sample = self.sampler.tick(position, forward, dt);
        let spawn = self.spawner.tick(&self.sampler);
        let spawn_point = self.poll_spawn_point(dt);

        TickReport {
            sample,
            spawn,
            spawn_point,
        }
    }

    fn poll_spawn_point(&mut self, dt: f32) -> Option<Pose> {
        if self.spawn_reported || !self.spawn_delay.tick(dt) {
            return None;
        }

        let first = self.spawner.oldest()?;
        let point = first
            .pose
            .translated(WORLD_UP * self.config.start.spawn_height);
        self.spawn_reported = true;
        info!("Vehicle spawn point ready at {:?}", point.position);
        Some(point)
    }

    /// Restarts the track at `position`: history cleared, every segment back
    /// in the pool, spawn delay re-armed.
    pub fn reset(&mut self, position: Float3, forward: Float3) {
        self.sampler.reset(position, forward);
        self.spawner.reset(forward);
        self.spawn_delay = Countdown::new(self.config.start.spawn_delay_seconds);
        self.spawn_reported = false;
        info!("Track reset at {position:?}");
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn sampler(&self) -> &PathSampler {
        &self.sampler
    }

    pub fn spawner(&self) -> &SegmentSpawner {
        &self.spawner
    }

    /// Active segments, oldest first.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.spawner.active()
    }
}
