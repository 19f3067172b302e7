use super::math::Float3;

/// Default fixed simulation rate for hosts that do not supply their own step.
pub const HZ: f32 = 60.0;
pub const DT: f32 = 1.0 / HZ;

/// Smallest vector length treated as a valid direction.
pub const EPSILON: f32 = 1.192_093e-7;

/// Cross-product magnitude below which two tangents count as parallel.
pub const TRANSPORT_EPSILON: f32 = 1e-6;

/// Up-vector projection length below which a frame falls back to another up.
pub const NO_ROLL_EPSILON: f32 = 1e-3;

pub const WORLD_UP: Float3 = Float3::UP;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TOLERANCE: f32 = 1e-6;

    #[test]
    fn dt_equals_one_over_hz() {
        assert_relative_eq!(DT, 1.0 / HZ, epsilon = TOLERANCE);
    }

    #[test]
    fn world_up_is_unit_y() {
        assert_relative_eq!(WORLD_UP.magnitude(), 1.0, epsilon = TOLERANCE);
        assert_relative_eq!(WORLD_UP.y, 1.0, epsilon = TOLERANCE);
    }

    #[test]
    fn epsilons_are_ordered() {
        assert!(EPSILON < TRANSPORT_EPSILON);
        assert!(TRANSPORT_EPSILON < NO_ROLL_EPSILON);
    }
}
