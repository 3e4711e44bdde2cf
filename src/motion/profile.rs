// Trapezoidal speed profile: power as a function of distance traveled

use crate::config::{ACCEL_WINDOW_TICKS, DECEL_WINDOW_TICKS, MAX_POWER, MIN_POWER};

/// Integer sign with the firmware's convention: zero maps to -1
fn sign(value: i32) -> f64 {
    if value > 0 { 1.0 } else { -1.0 }
}

/// Power the base should be driven at, given the move target and the ticks
/// traveled so far. Pure and total over all integer inputs.
///
/// Three mutually exclusive bands:
/// - ramp up linearly over the first [`ACCEL_WINDOW_TICKS`] ticks,
/// - ramp down linearly over the last [`DECEL_WINDOW_TICKS`] ticks of
///   remaining error,
/// - full power in between.
///
/// The half-distance guards keep the two ramps from overlapping, so a move
/// under ~300 ticks degenerates to ramp-up-then-ramp-down with no cruise.
/// The deceleration guard is strict at exactly half the target so that the
/// halfway point of a long move still cruises at full power. Output
/// magnitude never drops below [`MIN_POWER`]: at low commanded power the
/// base stalls instead of creeping. The floor always points in the target
/// direction, even on a small overshoot where the ramp has gone negative.
pub fn speed_profile(target: i32, traveled: i32) -> f64 {
    let direction = sign(target);
    let target_mag = (target as f64).abs();
    let traveled = traveled as f64;
    // Remaining distance, positive while still approaching the target and
    // negative once overshot
    let error = direction * (target_mag - traveled.abs());
    let half = (target.abs() / 2) as f64;

    let power = if traveled.abs() <= ACCEL_WINDOW_TICKS as f64 && traveled.abs() <= half {
        MAX_POWER / ACCEL_WINDOW_TICKS as f64 * traveled
    } else if error.abs() <= DECEL_WINDOW_TICKS as f64 && error.abs() < half {
        MAX_POWER / DECEL_WINDOW_TICKS as f64 * error
    } else {
        direction * MAX_POWER
    };

    if power.abs() < MIN_POWER {
        direction * MIN_POWER
    } else {
        power
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn floor_overrides_ramp_at_standstill() {
        // At the very start of an 800-tick move the ramp would command 0;
        // the minimum-speed floor takes over
        assert_eq!(speed_profile(800, 0), 40.0);
        assert_eq!(speed_profile(-800, 0), -40.0);
    }

    #[test]
    fn half_distance_boundary_is_cruise() {
        // traveled == |target|/2 sits past the accel window and exactly on
        // the decel guard boundary; it must resolve to full cruise power
        assert_eq!(speed_profile(800, 400), 127.0);
    }

    #[test]
    fn decel_ramp_is_floor_clamped() {
        // 50 ticks remaining: the ramp gives 127/500*50 = 12.7, below the
        // stall floor
        assert_eq!(speed_profile(800, 750), 40.0);
    }

    #[test]
    fn decel_ramp_above_floor() {
        // 400 ticks remaining on a long move: ramp output 127/500*400
        let power = speed_profile(2000, 1600);
        assert!((power - 101.6).abs() < EPS);
    }

    #[test]
    fn cruise_band_is_full_power() {
        assert_eq!(speed_profile(2000, 600), 127.0);
        assert_eq!(speed_profile(-2000, -600), -127.0);
    }

    #[test]
    fn odd_symmetry() {
        for traveled in [0, 30, 150, 400, 900, 1350, 1490] {
            let forward = speed_profile(1500, traveled);
            let backward = speed_profile(-1500, -traveled);
            assert_eq!(forward, -backward, "traveled={traveled}");
        }
    }

    #[test]
    fn accel_ramp_is_monotone_and_floored() {
        // Long move: ramp up over [0, 150], never below the 40 floor
        let mut prev = 0.0;
        for traveled in 0..=150 {
            let power = speed_profile(2000, traveled);
            assert!(power >= 40.0, "traveled={traveled} power={power}");
            assert!(power + EPS >= prev, "ramp must not decrease at {traveled}");
            assert!(power <= 127.0 + EPS);
            prev = power;
        }
        // End of the ramp meets cruise power
        assert!((speed_profile(2000, 150) - 127.0).abs() < EPS);
    }

    #[test]
    fn decel_ramp_is_monotone_toward_target() {
        let mut prev = 127.0 + EPS;
        for traveled in 1500..=1995 {
            let power = speed_profile(2000, traveled);
            assert!(power >= 40.0);
            assert!(power <= prev + EPS, "ramp must not increase at {traveled}");
            prev = power;
        }
    }

    #[test]
    fn short_move_skips_cruise() {
        // 200-tick move: the half-distance guards hand the accel ramp over
        // to the decel ramp with no full-power band. Peak power is the
        // accel ramp at the midpoint, 127/150*100.
        for traveled in 0..200 {
            let power = speed_profile(200, traveled);
            assert!(power <= 85.0, "traveled={traveled} power={power}");
        }
    }

    #[test]
    fn overshoot_behavior() {
        // Slight overshoot: the ramp goes negative but stays under the
        // floor, which pushes in the target direction (firmware quirk)
        assert_eq!(speed_profile(800, 900), 40.0);
        // Larger overshoot: the negative ramp exceeds the floor and
        // actually backs up
        let power = speed_profile(800, 1000);
        assert!((power - (-50.8)).abs() < EPS);
        // Far past both ramp windows the profile falls back to cruise in
        // the commanded direction
        assert_eq!(speed_profile(800, 1400), 127.0);
    }
}
