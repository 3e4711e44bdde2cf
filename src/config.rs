// Control-loop timing, drivetrain geometry compensation, pod bus layout
use std::time::Duration;

// Control loop period shared by every polling primitive
pub const LOOP_PERIOD: Duration = Duration::from_millis(10);

// Wall-clock guard applied by `LoopSettings::default()`. The base firmware
// this replaces had no guard and would spin forever on a stalled drivetrain;
// see DESIGN.md for the deviation note.
pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(10);

// Power command range accepted by the drive pods
pub const MAX_POWER: f64 = 127.0;

// Below this magnitude the base stalls against field friction, so the
// profiler never commands less
pub const MIN_POWER: f64 = 40.0;

// Trapezoidal profile windows, in encoder ticks
pub const ACCEL_WINDOW_TICKS: i32 = 150;
pub const DECEL_WINDOW_TICKS: i32 = 500;

// Proportional gain for heading hold and in-place turns
pub const HEADING_KP: f64 = 3.0;

// The gyro pod is mounted 90 degrees off the chassis forward axis
pub const HEADING_BIAS_DEG: f64 = 90.0;

// Gearing between the measured motor shaft and the wheel: commanded
// distances are scaled by 5/3 before profiling
pub const DISTANCE_SCALE_NUM: i32 = 5;
pub const DISTANCE_SCALE_DEN: i32 = 3;

// A profiled move settles once the remaining distance on the left-front
// encoder drops to this many ticks
pub const STOP_THRESHOLD_TICKS: f64 = 5.0;

// Pod bus ids (as flashed in the pods)
pub const POD_ID_LEFT_FRONT: u8 = 1;
pub const POD_ID_LEFT_BACK: u8 = 2;
pub const POD_ID_RIGHT_FRONT: u8 = 3;
pub const POD_ID_RIGHT_BACK: u8 = 4;
pub const POD_ID_GYRO: u8 = 9;

// Serial port for the pod bus
pub const DEFAULT_MOTOR_PORT: &str = "/dev/ttyUSB0";
