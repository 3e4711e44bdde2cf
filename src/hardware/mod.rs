// Hardware abstraction for the omnibase drivetrain
//
// Provides:
// - Device traits for drive motors, the heading gyro, and the loop clock
// - The `Drivetrain` bundle passed by reference into every motion primitive
// - Serial pod-bus backend and a simulated plant for benchless work

pub mod bus;
pub mod sim;

use std::thread;
use std::time::Duration;

use crate::config::MAX_POWER;

pub use bus::{BusError, BusGyro, BusMotor, open_drivetrain};
pub use sim::{SimClock, SimGyro, SimMotor, SimParams, sim_drivetrain};

/// Error from any drivetrain device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error(transparent)]
    Bus(#[from] BusError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// A drive motor with an accumulated encoder counter
pub trait DriveMotor {
    /// Command a power in [-127, 127]
    fn set_power(&mut self, power: i16) -> Result<()>;

    /// Accumulated encoder position in ticks since the last reset
    fn position(&mut self) -> Result<i32>;

    /// Zero the accumulated encoder counter
    fn reset_position(&mut self) -> Result<()>;
}

/// Single-axis heading sensor reporting accumulated degrees
///
/// The reading is unbounded: it keeps accumulating past ±360 across a
/// routine and is never wrapped by the motion core.
pub trait HeadingSensor {
    fn heading(&mut self) -> Result<f64>;

    /// Zero the accumulated heading (done once at routine start)
    fn reset(&mut self) -> Result<()>;
}

/// Coarse delay primitive used between control-loop iterations
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock backed [`Clock`] for real hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

fn clamp_power(value: f64) -> i16 {
    // Truncate toward zero after clamping, like the firmware's int cast
    value.clamp(-MAX_POWER, MAX_POWER) as i16
}

/// The four drive motors, the gyro, and any auxiliary encoders that must be
/// tared together with the drivetrain.
///
/// Exactly one primitive owns this bundle at a time (`&mut` access); nothing
/// else may command the drive motors while a primitive is blocking.
pub struct Drivetrain<M: DriveMotor, S: HeadingSensor> {
    pub left_front: M,
    pub left_back: M,
    pub right_front: M,
    pub right_back: M,
    pub gyro: S,
    /// Intake/roller encoders swept by [`Drivetrain::reset_positions`] so
    /// that distance bookkeeping elsewhere starts from zero too
    pub aux: Vec<M>,
}

impl<M: DriveMotor, S: HeadingSensor> Drivetrain<M, S> {
    pub fn new(left_front: M, left_back: M, right_front: M, right_back: M, gyro: S) -> Self {
        Self {
            left_front,
            left_back,
            right_front,
            right_back,
            gyro,
            aux: Vec::new(),
        }
    }

    pub fn with_aux(mut self, aux: Vec<M>) -> Self {
        self.aux = aux;
        self
    }

    /// Zero every encoder: all four drive motors plus the auxiliary ones.
    ///
    /// Must run before any distance-profiled move so "distance traveled"
    /// is meaningful for that move only.
    pub fn reset_positions(&mut self) -> Result<()> {
        self.left_front.reset_position()?;
        self.left_back.reset_position()?;
        self.right_front.reset_position()?;
        self.right_back.reset_position()?;
        for motor in &mut self.aux {
            motor.reset_position()?;
        }
        Ok(())
    }

    /// Command each wheel individually; values are clamped to [-127, 127]
    /// at this boundary.
    pub fn command(&mut self, lf: f64, lb: f64, rf: f64, rb: f64) -> Result<()> {
        self.left_front.set_power(clamp_power(lf))?;
        self.left_back.set_power(clamp_power(lb))?;
        self.right_front.set_power(clamp_power(rf))?;
        self.right_back.set_power(clamp_power(rb))?;
        Ok(())
    }

    /// Command the left and right motor pairs
    pub fn tank(&mut self, left: f64, right: f64) -> Result<()> {
        self.command(left, left, right, right)
    }

    /// Zero power on all four drive motors
    pub fn stop(&mut self) -> Result<()> {
        self.command(0.0, 0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_power_truncates_and_saturates() {
        assert_eq!(clamp_power(12.7), 12);
        assert_eq!(clamp_power(-12.7), -12);
        assert_eq!(clamp_power(400.0), 127);
        assert_eq!(clamp_power(-400.0), -127);
        assert_eq!(clamp_power(0.0), 0);
    }
}
