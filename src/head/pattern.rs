use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::motion::SnakeHead;

/// Named set of the head parameters a pattern controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternPreset {
    pub name: String,
    pub speed: f32,
    pub lateral_amp: f32,
    pub lateral_wavelength: f32,
    pub vertical_amp: f32,
    pub vertical_wavelength: f32,
}

impl PatternPreset {
    pub fn new(
        name: impl Into<String>,
        speed: f32,
        lateral_amp: f32,
        lateral_wavelength: f32,
        vertical_amp: f32,
        vertical_wavelength: f32,
    ) -> Self {
        Self {
            name: name.into(),
            speed,
            lateral_amp,
            lateral_wavelength,
            vertical_amp,
            vertical_wavelength,
        }
    }

    /// Applied once when a cycler is created, before the first blend.
    pub fn starter() -> Self {
        Self::new("Starter", 1.0, 1.0, 77.0, 1.0, 162.0)
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("C", 1.0, 20.0, 77.0, 2.0, 162.0),
            Self::new("B", 1.0, 10.0, 77.0, 5.0, 162.0),
            Self::new("A", 1.0, 0.0, 77.0, 8.0, 162.0),
        ]
    }

    /// Field-wise linear blend; the name is taken from `to`.
    pub fn lerp(&self, to: &Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            name: to.name.clone(),
            speed: mix(self.speed, to.speed),
            lateral_amp: mix(self.lateral_amp, to.lateral_amp),
            lateral_wavelength: mix(self.lateral_wavelength, to.lateral_wavelength),
            vertical_amp: mix(self.vertical_amp, to.vertical_amp),
            vertical_wavelength: mix(self.vertical_wavelength, to.vertical_wavelength),
        }
    }

    fn approx_eq(&self, other: &Self, eps: f32) -> bool {
        [
            (self.speed, other.speed),
            (self.lateral_amp, other.lateral_amp),
            (self.lateral_wavelength, other.lateral_wavelength),
            (self.vertical_amp, other.vertical_amp),
            (self.vertical_wavelength, other.vertical_wavelength),
        ]
        .iter()
        .all(|(a, b)| (a - b).abs() < eps)
    }

    pub fn apply_to(&self, head: &mut SnakeHead) {
        head.apply_pattern(
            self.speed,
            self.lateral_amp,
            self.lateral_wavelength,
            self.vertical_amp,
            self.vertical_wavelength,
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CyclerParams {
    pub interval_seconds: f32,
    pub blend_seconds: f32,
    pub random_order: bool,
    pub start_index: usize,
    pub play_on_start: bool,
    /// Keep re-applying a lone preset every interval.
    pub loop_single_preset: bool,
}

impl Default for CyclerParams {
    fn default() -> Self {
        Self {
            interval_seconds: 5.0,
            blend_seconds: 1.5,
            random_order: false,
            start_index: 0,
            play_on_start: true,
            loop_single_preset: false,
        }
    }
}

impl CyclerParams {
    /// Interval floored at 0.1 s, blend at 0 s.
    pub fn sanitized(self) -> Self {
        Self {
            interval_seconds: self.interval_seconds.max(0.1),
            blend_seconds: self.blend_seconds.max(0.0),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CyclePhase {
    Stopped,
    /// Waiting before the next cycle starts.
    Holding { remaining: f32 },
    Blending {
        elapsed: f32,
        from: PatternPreset,
        to: usize,
    },
}

fn smoothstep(a: f32) -> f32 {
    a * a * (3.0 - 2.0 * a)
}

/// Cycles a [`SnakeHead`] through presets, blending between them.
///
/// Advanced explicitly by [`PatternCycler::tick`]; every preset is held for
/// `interval_seconds`, of which the first `blend_seconds` is a smoothstep
/// blend from the previous preset.
#[derive(Debug, Clone)]
pub struct PatternCycler {
    params: CyclerParams,
    presets: Vec<PatternPreset>,
    starter: PatternPreset,
    index: usize,
    first_cycle: bool,
    phase: CyclePhase,
}

impl PatternCycler {
    /// Applies the starter preset to `head` and, if configured, starts playing.
    pub fn new(params: CyclerParams, presets: Vec<PatternPreset>, head: &mut SnakeHead) -> Self {
        let params = params.sanitized();
        let starter = PatternPreset::starter();
        starter.apply_to(head);

        let mut cycler = Self {
            params,
            index: params.start_index.min(presets.len().saturating_sub(1)),
            presets,
            starter,
            first_cycle: true,
            phase: CyclePhase::Stopped,
        };
        if params.play_on_start {
            cycler.play();
        }
        cycler
    }

    fn can_cycle(&self) -> bool {
        self.presets.len() > 1 || (self.presets.len() == 1 && self.params.loop_single_preset)
    }

    /// Starts cycling on the next tick. No-op while already playing.
    pub fn play(&mut self) {
        if self.phase == CyclePhase::Stopped && self.can_cycle() {
            self.phase = CyclePhase::Holding { remaining: 0.0 };
        }
    }

    /// Freezes the head at whatever parameters were last applied.
    pub fn stop(&mut self) {
        self.phase = CyclePhase::Stopped;
    }

    /// Jumps straight to the next preset without blending.
    pub fn next_immediate<R: Rng + ?Sized>(&mut self, head: &mut SnakeHead, rng: &mut R) {
        let next = self.next_index(rng);
        if next == self.index {
            return;
        }
        self.index = next;
        self.presets[next].apply_to(head);
    }

    pub fn tick<R: Rng + ?Sized>(&mut self, dt: f32, head: &mut SnakeHead, rng: &mut R) {
        match &mut self.phase {
            CyclePhase::Stopped => {}
            CyclePhase::Holding { remaining } => {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    self.begin_cycle(head, rng);
                }
            }
            CyclePhase::Blending { elapsed, from, to } => {
                *elapsed += dt;
                let to = *to;
                if *elapsed >= self.params.blend_seconds {
                    self.finish_cycle(to, head);
                } else {
                    let a = smoothstep(*elapsed / self.params.blend_seconds);
                    from.lerp(&self.presets[to], a).apply_to(head);
                }
            }
        }
    }

    fn begin_cycle<R: Rng + ?Sized>(&mut self, head: &mut SnakeHead, rng: &mut R) {
        let next = self.next_index(rng);
        let from = if self.first_cycle {
            self.first_cycle = false;
            self.starter.clone()
        } else {
            self.presets[self.index].clone()
        };

        if next == self.index && self.presets.len() == 1 && !self.params.loop_single_preset {
            self.phase = CyclePhase::Holding {
                remaining: self.params.interval_seconds,
            };
            return;
        }

        let to = &self.presets[next];
        if self.params.blend_seconds > 1e-4 && !from.approx_eq(to, 1e-3) {
            debug!("Blending head pattern {} -> {}", from.name, to.name);
            from.apply_to(head);
            self.phase = CyclePhase::Blending {
                elapsed: 0.0,
                from,
                to: next,
            };
        } else {
            self.finish_cycle(next, head);
        }
    }

    fn finish_cycle(&mut self, to: usize, head: &mut SnakeHead) {
        self.presets[to].apply_to(head);
        self.index = to;
        self.phase = CyclePhase::Holding {
            remaining: (self.params.interval_seconds - self.params.blend_seconds).max(0.0),
        };
    }

    fn next_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.presets.len();
        if n <= 1 {
            return self.index;
        }
        if !self.params.random_order {
            return (self.index + 1) % n;
        }
        loop {
            let pick = rng.gen_range(0..n);
            if pick != self.index {
                return pick;
            }
        }
    }

    pub fn params(&self) -> &CyclerParams {
        &self.params
    }

    pub fn phase(&self) -> &CyclePhase {
        &self.phase
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&PatternPreset> {
        self.presets.get(self.index)
    }

    pub fn is_playing(&self) -> bool {
        self.phase != CyclePhase::Stopped
    }
}
