// Proportional heading correction

use crate::config::HEADING_KP;

/// Signed correction term for holding or reaching a heading.
///
/// Plain proportional control over raw accumulated degrees; headings are
/// never wrapped, so targets outside [-180, 180] are expected across a
/// routine. The output is deliberately unclamped: callers sum it with the
/// profiled power and rely on the per-motor clamp at the drivetrain
/// boundary. Large heading errors therefore saturate the motors, a known
/// oscillation risk documented in DESIGN.md.
pub fn heading_correction(target: f64, current: f64) -> f64 {
    (target - current) * HEADING_KP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_error_zero_correction() {
        for heading in [-720.0, -90.0, 0.0, 45.5, 365.0, 1080.0] {
            assert_eq!(heading_correction(heading, heading), 0.0);
        }
    }

    #[test]
    fn slope_is_exactly_three() {
        assert_eq!(heading_correction(90.0, 60.0), 90.0);
        assert_eq!(heading_correction(10.0, 11.0), -3.0);
        // Linear in the error: doubling the error doubles the output
        let base = heading_correction(50.0, 30.0);
        assert_eq!(heading_correction(70.0, 30.0), 2.0 * base);
    }

    #[test]
    fn unbounded_output_on_large_error() {
        // No clamp here; saturation happens at the motor boundary
        assert_eq!(heading_correction(360.0, 0.0), 1080.0);
    }
}
