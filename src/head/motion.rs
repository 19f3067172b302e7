use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::sim::{no_roll_up, Float3, Frame, Pose, WORLD_UP};

/// Shape of the head's sinusoidal path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadParams {
    /// Meters per second along +z.
    pub forward_speed: f32,
    pub lateral_amp: f32,
    pub lateral_wavelength: f32,
    pub vertical_amp: f32,
    pub vertical_wavelength: f32,
    /// Extra phase of the vertical wave, radians.
    pub phase_offset: f32,
    pub max_turn_rate_deg_per_sec: f32,
    pub base_y: f32,
}

impl Default for HeadParams {
    fn default() -> Self {
        Self {
            forward_speed: 20.0,
            lateral_amp: 16.0,
            lateral_wavelength: 200.0,
            vertical_amp: 8.0,
            vertical_wavelength: 340.0,
            phase_offset: 0.7,
            max_turn_rate_deg_per_sec: 120.0,
            base_y: 100.0,
        }
    }
}

/// Wave number for `wavelength`; flat when the wavelength is degenerate.
fn wave_number(wavelength: f32) -> f32 {
    if wavelength > 0.001 {
        TAU / wavelength
    } else {
        0.0
    }
}

/// Reference head: moves forward along +z while weaving on two sine waves,
/// with its heading turn-rate limited.
#[derive(Debug, Clone)]
pub struct SnakeHead {
    params: HeadParams,
    distance: f32,
    lateral_phase: f32,
    vertical_phase: f32,
    position: Float3,
    forward: Float3,
    up: Float3,
    last_position: Option<Float3>,
}

impl SnakeHead {
    /// Head with wave phases drawn uniformly from `[0, 2π)`.
    pub fn new<R: Rng + ?Sized>(params: HeadParams, rng: &mut R) -> Self {
        let lateral_phase = rng.gen_range(0.0..TAU);
        let vertical_phase = rng.gen_range(0.0..TAU);
        Self::with_phases(params, lateral_phase, vertical_phase)
    }

    pub fn seeded(params: HeadParams, seed: u64) -> Self {
        Self::new(params, &mut Pcg32::seed_from_u64(seed))
    }

    pub fn with_phases(params: HeadParams, lateral_phase: f32, vertical_phase: f32) -> Self {
        Self {
            params,
            distance: 0.0,
            lateral_phase,
            vertical_phase,
            position: Float3::new(0.0, params.base_y, 0.0),
            forward: Float3::FORWARD,
            up: WORLD_UP,
            last_position: None,
        }
    }

    /// Advances the head by `dt` seconds and returns its new pose.
    pub fn tick(&mut self, dt: f32) -> Pose {
        let p = &self.params;
        self.distance += p.forward_speed * dt;

        let s = self.distance;
        let x = p.lateral_amp * (wave_number(p.lateral_wavelength) * s + self.lateral_phase).sin();
        let y = p.base_y
            + p.vertical_amp
                * (wave_number(p.vertical_wavelength) * s + self.vertical_phase + p.phase_offset)
                    .sin();
        let next = Float3::new(x, y, s);

        // First tick pretends the head came from just behind, so it starts along +z.
        let last = self
            .last_position
            .unwrap_or(next - Float3::FORWARD * 0.01);
        let delta = next - last;
        let tangent = if delta.magnitude_squared() < 1e-6 {
            self.forward
        } else {
            delta.normalize()
        };

        let max_step = p.max_turn_rate_deg_per_sec.to_radians() * dt;
        self.forward = self.forward.rotate_towards(tangent, max_step).normalize();
        self.up = no_roll_up(self.forward, self.up);
        self.position = next;
        self.last_position = Some(next);

        self.pose()
    }

    /// Replaces the motion parameters the pattern cycler drives.
    pub fn apply_pattern(
        &mut self,
        speed: f32,
        lateral_amp: f32,
        lateral_wavelength: f32,
        vertical_amp: f32,
        vertical_wavelength: f32,
    ) {
        self.params.forward_speed = speed;
        self.params.lateral_amp = lateral_amp;
        self.params.lateral_wavelength = lateral_wavelength;
        self.params.vertical_amp = vertical_amp;
        self.params.vertical_wavelength = vertical_wavelength;
    }

    pub fn params(&self) -> &HeadParams {
        &self.params
    }

    pub fn position(&self) -> Float3 {
        self.position
    }

    pub fn forward(&self) -> Float3 {
        self.forward
    }

    /// Distance travelled along +z.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn phases(&self) -> (f32, f32) {
        (self.lateral_phase, self.vertical_phase)
    }

    pub fn pose(&self) -> Pose {
        Pose::from_frame(self.position, Frame::look(self.forward, self.up))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::DT;
    use approx::assert_relative_eq;

    const TOLERANCE: f32 = 1e-4;

    #[test]
    fn first_tick_faces_forward() {
        let mut head = SnakeHead::with_phases(HeadParams::default(), 0.0, 0.0);
        let pose = head.tick(DT);

        assert_relative_eq!(pose.position.z, 20.0 * DT, epsilon = TOLERANCE);
        let expected_y = 100.0 + 8.0 * (TAU / 340.0 * 20.0 * DT + 0.7).sin();
        assert_relative_eq!(pose.position.y, expected_y, epsilon = TOLERANCE);
        assert_relative_eq!(head.forward().z, 1.0, epsilon = TOLERANCE);
        assert_relative_eq!(pose.up().y, 1.0, epsilon = TOLERANCE);
    }

    #[test]
    fn phases_are_reproducible_and_in_range() {
        let a = SnakeHead::seeded(HeadParams::default(), 42);
        let b = SnakeHead::seeded(HeadParams::default(), 42);
        assert_eq!(a.phases(), b.phases());

        for seed in 0..64 {
            let (lat, vert) = SnakeHead::seeded(HeadParams::default(), seed).phases();
            assert!((0.0..TAU).contains(&lat));
            assert!((0.0..TAU).contains(&vert));
        }
    }

    #[test]
    fn degenerate_wavelength_flattens_wave() {
        let params = HeadParams {
            lateral_wavelength: 0.0,
            ..HeadParams::default()
        };
        let mut head = SnakeHead::with_phases(params, 1.0, 0.0);

        for _ in 0..30 {
            let pose = head.tick(DT);
            assert_relative_eq!(pose.position.x, 16.0 * 1.0f32.sin(), epsilon = TOLERANCE);
        }
    }

    #[test]
    fn turn_rate_is_limited() {
        let params = HeadParams {
            lateral_amp: 30.0,
            lateral_wavelength: 20.0,
            max_turn_rate_deg_per_sec: 45.0,
            ..HeadParams::default()
        };
        let mut head = SnakeHead::with_phases(params, 0.0, 0.0);
        let max_step = 45.0f32.to_radians() * DT;

        let mut prev = head.forward();
        for _ in 0..300 {
            head.tick(DT);
            let turned = prev.angle_between(head.forward());
            assert!(turned <= max_step + 1e-4, "turned {turned} > {max_step}");
            prev = head.forward();
        }
    }

    #[test]
    fn heading_follows_the_path() {
        let mut head = SnakeHead::seeded(HeadParams::default(), 3);
        head.tick(DT);
        let mut last = head.position();
        for _ in 0..600 {
            head.tick(DT);
            let travel = (head.position() - last).normalize();
            assert!(head.forward().dot(travel) > 0.95);
            last = head.position();
        }
    }

    #[test]
    fn apply_pattern_replaces_wave_params() {
        let mut head = SnakeHead::seeded(HeadParams::default(), 1);
        head.apply_pattern(5.0, 1.0, 77.0, 2.0, 162.0);

        let p = head.params();
        assert_eq!(p.forward_speed, 5.0);
        assert_eq!(p.lateral_wavelength, 77.0);
        assert_eq!(p.vertical_amp, 2.0);
        assert_eq!(p.max_turn_rate_deg_per_sec, 120.0);

        head.tick(1.0);
        assert_relative_eq!(head.distance(), 5.0);
    }
}
