// Closed-loop motion control for the omnibase
//
// Provides:
// - Trapezoidal distance profiler (power vs. distance remaining)
// - Proportional heading corrector
// - Blocking motion primitives composed from the two

pub mod controller;
pub mod heading;
pub mod profile;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::{DEFAULT_MOVE_TIMEOUT, LOOP_PERIOD};
use crate::hardware::DeviceError;

pub use controller::MotionController;
pub use heading::heading_correction;
pub use profile::speed_profile;

/// Error from a blocking motion primitive
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Move timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("Move cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MotionError>;

/// Cooperative cancellation flag for an in-progress primitive
///
/// Clone the token before starting a move; flipping it from another thread
/// makes the polling loop stop the motors and return
/// [`MotionError::Cancelled`] at its next iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Polling behavior shared by every primitive
///
/// The period and timeout are explicit here instead of being buried in the
/// loops. `timeout: None` reproduces the original firmware's behavior of
/// looping forever on a mechanically stalled base.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Inter-iteration delay; bounds control-loop jitter
    pub period: Duration,
    /// Wall-clock budget for a single primitive call
    pub timeout: Option<Duration>,
    /// Caller-signalled abort
    pub cancel: CancelToken,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            period: LOOP_PERIOD,
            timeout: Some(DEFAULT_MOVE_TIMEOUT),
            cancel: CancelToken::new(),
        }
    }
}

impl LoopSettings {
    /// Settings with no wall-clock guard (source-faithful behavior)
    pub fn unguarded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }
}
