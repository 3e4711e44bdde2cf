// Report types emitted by the routine runner

use serde::{Deserialize, Serialize};

use crate::motion::MotionError;

/// One line of the routine log: a single primitive call and how it ended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveReport {
    pub step: u32,
    pub op: String,
    pub elapsed_ms: u64,
    pub outcome: MoveOutcome,
}

/// How a primitive call ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    Settled,
    TimedOut,
    Cancelled,
    DeviceFault,
}

impl MoveOutcome {
    pub fn from_result(result: &Result<(), MotionError>) -> Self {
        match result {
            Ok(()) => MoveOutcome::Settled,
            Err(MotionError::TimedOut { .. }) => MoveOutcome::TimedOut,
            Err(MotionError::Cancelled) => MoveOutcome::Cancelled,
            Err(MotionError::Device(_)) => MoveOutcome::DeviceFault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn outcome_maps_every_error_variant() {
        assert_eq!(MoveOutcome::from_result(&Ok(())), MoveOutcome::Settled);
        assert_eq!(
            MoveOutcome::from_result(&Err(MotionError::Cancelled)),
            MoveOutcome::Cancelled
        );
        assert_eq!(
            MoveOutcome::from_result(&Err(MotionError::TimedOut {
                elapsed: Duration::from_secs(1)
            })),
            MoveOutcome::TimedOut
        );
    }

    #[test]
    fn report_serializes_with_snake_case_outcome() {
        let report = MoveReport {
            step: 3,
            op: "drive_to(800, -65)".to_string(),
            elapsed_ms: 1250,
            outcome: MoveOutcome::TimedOut,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"timed_out\""));
        assert!(json.contains("\"step\":3"));
    }
}
