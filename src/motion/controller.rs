// Blocking motion primitives composed from the profiler and the corrector
//
// Exactly one primitive runs at a time; each owns the drivetrain for its
// whole duration and busy-polls at the configured loop period until its
// termination condition is met.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{
    DISTANCE_SCALE_DEN, DISTANCE_SCALE_NUM, HEADING_BIAS_DEG, STOP_THRESHOLD_TICKS,
};
use crate::hardware::{Clock, Drivetrain, DriveMotor, HeadingSensor};

use super::{LoopSettings, MotionError, Result, heading_correction, speed_profile};

/// Drives the four-wheel base through blocking, feedback-controlled moves.
///
/// The drivetrain bundle is owned here and passed into every primitive by
/// `&mut`, so nothing else can command the drive motors while a move is in
/// progress.
pub struct MotionController<M: DriveMotor, S: HeadingSensor, C: Clock> {
    pub drivetrain: Drivetrain<M, S>,
    clock: C,
    pub settings: LoopSettings,
}

impl<M: DriveMotor, S: HeadingSensor, C: Clock> MotionController<M, S, C> {
    pub fn new(drivetrain: Drivetrain<M, S>, clock: C) -> Self {
        Self {
            drivetrain,
            clock,
            settings: LoopSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    /// One inter-iteration pause plus the cancel/timeout guard.
    ///
    /// The guard is a deviation from the source firmware, which polled
    /// unconditionally; on trip the motors are stopped before returning.
    fn pace(&mut self, elapsed: &mut Duration) -> Result<()> {
        if self.settings.cancel.is_cancelled() {
            self.drivetrain.stop()?;
            warn!("move cancelled after {:?}", elapsed);
            return Err(MotionError::Cancelled);
        }
        if let Some(limit) = self.settings.timeout
            && *elapsed >= limit
        {
            self.drivetrain.stop()?;
            warn!("move timed out after {:?}", elapsed);
            return Err(MotionError::TimedOut { elapsed: *elapsed });
        }
        self.clock.sleep(self.settings.period);
        *elapsed += self.settings.period;
        Ok(())
    }

    /// Drive straight for `distance` ticks while holding `heading` degrees.
    ///
    /// The commanded distance is scaled by 5/3 and the heading biased by
    /// +90 degrees to compensate the drivetrain gearing and gyro mounting
    /// (fixed hardware constants). Distance feedback comes from the
    /// left-front encoder only; the other wheels are mechanically slaved.
    /// Blocks until the remaining distance drops to the stop threshold,
    /// then zeroes all four motors.
    pub fn drive_to(&mut self, distance: i32, heading: f64) -> Result<()> {
        let target = distance * DISTANCE_SCALE_NUM / DISTANCE_SCALE_DEN;
        let goal_heading = heading + HEADING_BIAS_DEG;
        info!(distance, target, goal_heading, "drive_to");
        self.drivetrain.reset_positions()?;

        let mut elapsed = Duration::ZERO;
        let mut iterations = 0u32;
        loop {
            let traveled = self.drivetrain.left_front.position()?;
            let remaining = (target as f64).abs() - (traveled as f64).abs();
            if remaining <= STOP_THRESHOLD_TICKS {
                break;
            }

            let power = speed_profile(target, traveled);
            let correction = heading_correction(goal_heading, self.drivetrain.gyro.heading()?);
            debug!(traveled, power, correction, "drive_to iteration");
            self.drivetrain
                .tank(power + correction, power - correction)?;

            iterations += 1;
            self.pace(&mut elapsed)?;
        }

        self.drivetrain.stop()?;
        info!(iterations, "drive_to settled");
        Ok(())
    }

    /// Spin in place through a positive-going `angle`.
    ///
    /// Compares the magnitude of the relative angle against the magnitude
    /// of the target, so an overshoot in either rotational direction ends
    /// the loop. This direction-discarding termination mirrors the
    /// original firmware and differs deliberately from
    /// [`turn_negative`](Self::turn_negative); see DESIGN.md.
    pub fn turn_positive(&mut self, angle: f64) -> Result<()> {
        let initial = self.drivetrain.gyro.heading()?;
        let mut current = self.drivetrain.gyro.heading()? - initial;
        let mut correction = heading_correction(angle, current);
        info!(angle, initial, "turn_positive");

        let mut elapsed = Duration::ZERO;
        let mut iterations = 0u32;
        while current.abs() < angle.abs() {
            self.drivetrain.tank(correction, -correction)?;
            // The command lags the angle sample by one iteration, as in the
            // source firmware
            correction = heading_correction(angle, current);
            current = (self.drivetrain.gyro.heading()? - initial).abs();

            iterations += 1;
            self.pace(&mut elapsed)?;
        }

        self.drivetrain.stop()?;
        info!(iterations, current, "turn_positive settled");
        Ok(())
    }

    /// Spin in place through a negative-going `angle`.
    ///
    /// Unlike [`turn_positive`](Self::turn_positive) the relative angle is
    /// compared signed, so only crossing the target from above terminates
    /// the loop.
    pub fn turn_negative(&mut self, angle: f64) -> Result<()> {
        let initial = self.drivetrain.gyro.heading()?;
        let mut current = self.drivetrain.gyro.heading()? - initial;
        let mut correction = heading_correction(angle, current);
        info!(angle, initial, "turn_negative");

        let mut elapsed = Duration::ZERO;
        let mut iterations = 0u32;
        while current > angle {
            self.drivetrain.tank(correction, -correction)?;
            correction = heading_correction(angle, current);
            current = self.drivetrain.gyro.heading()? - initial;

            iterations += 1;
            self.pace(&mut elapsed)?;
        }

        self.drivetrain.stop()?;
        info!(iterations, current, "turn_negative settled");
        Ok(())
    }

    /// Open-loop drive at fixed left/right powers for `duration`, then stop.
    pub fn drive_timed(&mut self, left: i16, right: i16, duration: Duration) -> Result<()> {
        info!(left, right, ?duration, "drive_timed");
        self.drivetrain.tank(left as f64, right as f64)?;
        self.clock.sleep(duration);
        self.drivetrain.stop()?;
        Ok(())
    }

    /// Open-loop drive that leaves the motors running.
    ///
    /// Used to chain a power command across a following primitive; the
    /// caller is responsible for stopping the motors afterwards (a
    /// `drive_open(0, 0)` does).
    pub fn drive_open(&mut self, left: i16, right: i16) -> Result<()> {
        info!(left, right, "drive_open");
        self.drivetrain.tank(left as f64, right as f64)?;
        Ok(())
    }

    /// Lateral slide at fixed power for `duration`, heading-corrected once
    /// at the moment of command.
    ///
    /// Cross pattern: front-left and back-right push one way, front-right
    /// and back-left the other. No +90 bias is applied to `goal_heading`
    /// here (source behavior).
    pub fn slide_timed(&mut self, power: i16, duration: Duration, goal_heading: f64) -> Result<()> {
        info!(power, ?duration, goal_heading, "slide_timed");
        let p = power as f64;
        let c = heading_correction(goal_heading, self.drivetrain.gyro.heading()?);
        self.drivetrain.command(p - c, -p - c, -p + c, p + c)?;
        self.clock.sleep(duration);
        self.drivetrain.stop()?;
        Ok(())
    }

    /// Lateral slide until the left-front encoder magnitude reaches
    /// `target` ticks, re-correcting the heading every iteration.
    ///
    /// The power is applied directly the whole move (no trapezoidal ramp),
    /// and neither the 5/3 distance scale nor the heading bias applies. A
    /// non-positive `target` returns immediately. The correction enters
    /// this cross pattern with the opposite sign from
    /// [`slide_timed`](Self::slide_timed); both match the source firmware.
    pub fn slide_to_target(&mut self, power: i16, target: i32, goal_heading: f64) -> Result<()> {
        info!(power, target, goal_heading, "slide_to_target");
        self.drivetrain.reset_positions()?;
        let p = power as f64;

        let mut elapsed = Duration::ZERO;
        let mut iterations = 0u32;
        loop {
            let traveled = self.drivetrain.left_front.position()?;
            if (traveled as f64).abs() >= target as f64 {
                break;
            }

            let c = heading_correction(goal_heading, self.drivetrain.gyro.heading()?);
            debug!(traveled, c, "slide_to_target iteration");
            self.drivetrain.command(p + c, -p + c, -p - c, p - c)?;

            iterations += 1;
            self.pace(&mut elapsed)?;
        }

        self.drivetrain.stop()?;
        info!(iterations, "slide_to_target settled");
        Ok(())
    }
}
