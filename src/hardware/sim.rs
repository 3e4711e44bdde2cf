// Simulated plant for running the motion core without hardware
//
// A shared first-order model: each wheel integrates ticks from its commanded
// power, and heading follows the left/right power differential. The plant
// advances exactly one step per control-loop sleep, so closed-loop tests are
// deterministic regardless of the configured period.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::{Clock, Drivetrain, DriveMotor, HeadingSensor, Result};

/// Slots 0-3 are the drive wheels (lf, lb, rf, rb); the rest are auxiliary
/// intake/roller encoders that only the reset sweep touches.
pub const SLOT_LEFT_FRONT: usize = 0;
pub const SLOT_LEFT_BACK: usize = 1;
pub const SLOT_RIGHT_FRONT: usize = 2;
pub const SLOT_RIGHT_BACK: usize = 3;
const NUM_SLOTS: usize = 8;

/// Plant response parameters
#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    /// Ticks a wheel advances per step per unit of commanded power
    pub ticks_per_power: f64,
    /// Heading degrees per step per unit of left/right power differential
    pub deg_per_power: f64,
    /// Minimum heading motion per step while any differential is commanded.
    /// Real drivetrains creep through stiction instead of settling
    /// asymptotically, and the turn loops exit on a crossing, not a band.
    pub min_slew: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            ticks_per_power: 0.05,
            deg_per_power: 0.02,
            min_slew: 0.05,
        }
    }
}

impl SimParams {
    /// A plant that never moves, for exercising the stall guards
    pub fn stalled() -> Self {
        Self {
            ticks_per_power: 0.0,
            deg_per_power: 0.0,
            min_slew: 0.0,
        }
    }
}

/// Shared state of the simulated base
pub struct SimState {
    params: SimParams,
    powers: [i16; NUM_SLOTS],
    positions: [f64; NUM_SLOTS],
    heading: f64,
    steps: u64,
}

impl SimState {
    fn new(params: SimParams) -> Self {
        Self {
            params,
            powers: [0; NUM_SLOTS],
            positions: [0.0; NUM_SLOTS],
            heading: 0.0,
            steps: 0,
        }
    }

    /// Advance the plant by one step
    fn step(&mut self) {
        for i in 0..NUM_SLOTS {
            self.positions[i] += self.powers[i] as f64 * self.params.ticks_per_power;
        }

        let left = (self.powers[SLOT_LEFT_FRONT] as f64 + self.powers[SLOT_LEFT_BACK] as f64) / 2.0;
        let right =
            (self.powers[SLOT_RIGHT_FRONT] as f64 + self.powers[SLOT_RIGHT_BACK] as f64) / 2.0;
        let differential = left - right;

        let mut rate = differential * self.params.deg_per_power;
        if differential != 0.0 && rate.abs() < self.params.min_slew {
            rate = self.params.min_slew.copysign(differential);
        }
        self.heading += rate;
        self.steps += 1;
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn power(&self, slot: usize) -> i16 {
        self.powers[slot]
    }

    pub fn position(&self, slot: usize) -> f64 {
        self.positions[slot]
    }

    /// Force an encoder reading, for setting up reset-invariant tests
    pub fn set_position(&mut self, slot: usize, ticks: f64) {
        self.positions[slot] = ticks;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

pub type SharedSim = Rc<RefCell<SimState>>;

/// One simulated wheel or auxiliary encoder
pub struct SimMotor {
    state: SharedSim,
    slot: usize,
}

impl DriveMotor for SimMotor {
    fn set_power(&mut self, power: i16) -> Result<()> {
        self.state.borrow_mut().powers[self.slot] = power;
        Ok(())
    }

    fn position(&mut self) -> Result<i32> {
        Ok(self.state.borrow().positions[self.slot] as i32)
    }

    fn reset_position(&mut self) -> Result<()> {
        self.state.borrow_mut().positions[self.slot] = 0.0;
        Ok(())
    }
}

/// The simulated gyro
pub struct SimGyro {
    state: SharedSim,
}

impl HeadingSensor for SimGyro {
    fn heading(&mut self) -> Result<f64> {
        Ok(self.state.borrow().heading)
    }

    fn reset(&mut self) -> Result<()> {
        self.state.borrow_mut().heading = 0.0;
        Ok(())
    }
}

/// Clock that advances the plant one step per sleep
pub struct SimClock {
    state: SharedSim,
}

impl Clock for SimClock {
    fn sleep(&mut self, _duration: Duration) {
        self.state.borrow_mut().step();
    }
}

/// Build a fully wired simulated drivetrain
///
/// Returns the drivetrain bundle (four wheels plus four auxiliary encoders),
/// the plant-stepping clock, and a handle to the shared state for
/// inspection.
pub fn sim_drivetrain(params: SimParams) -> (Drivetrain<SimMotor, SimGyro>, SimClock, SharedSim) {
    let state: SharedSim = Rc::new(RefCell::new(SimState::new(params)));
    let motor = |slot: usize| SimMotor {
        state: Rc::clone(&state),
        slot,
    };

    let drivetrain = Drivetrain::new(
        motor(SLOT_LEFT_FRONT),
        motor(SLOT_LEFT_BACK),
        motor(SLOT_RIGHT_FRONT),
        motor(SLOT_RIGHT_BACK),
        SimGyro {
            state: Rc::clone(&state),
        },
    )
    .with_aux((4..NUM_SLOTS).map(motor).collect());

    let clock = SimClock {
        state: Rc::clone(&state),
    };

    (drivetrain, clock, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheels_integrate_commanded_power() {
        let (mut dt, mut clock, state) = sim_drivetrain(SimParams::default());
        dt.tank(100.0, 100.0).unwrap();
        for _ in 0..10 {
            clock.sleep(Duration::ZERO);
        }
        let expected = 100.0 * 0.05 * 10.0;
        assert!((state.borrow().position(SLOT_LEFT_FRONT) - expected).abs() < 1e-6);
        assert!((state.borrow().position(SLOT_RIGHT_BACK) - expected).abs() < 1e-6);
        // Symmetric command leaves heading untouched
        assert_eq!(state.borrow().heading(), 0.0);
    }

    #[test]
    fn differential_turns_the_plant() {
        let (mut dt, mut clock, state) = sim_drivetrain(SimParams::default());
        dt.tank(100.0, -100.0).unwrap();
        clock.sleep(Duration::ZERO);
        assert!(state.borrow().heading() > 0.0);

        dt.tank(-100.0, 100.0).unwrap();
        clock.sleep(Duration::ZERO);
        clock.sleep(Duration::ZERO);
        assert!(state.borrow().heading() < 0.0);
    }

    #[test]
    fn stalled_plant_never_moves() {
        let (mut dt, mut clock, state) = sim_drivetrain(SimParams::stalled());
        dt.tank(127.0, 127.0).unwrap();
        for _ in 0..50 {
            clock.sleep(Duration::ZERO);
        }
        assert_eq!(state.borrow().position(SLOT_LEFT_FRONT), 0.0);
        assert_eq!(state.borrow().heading(), 0.0);
    }
}
