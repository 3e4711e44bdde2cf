// Closed-loop motion control runtime for a four-wheel omnidirectional base
//
// The motion core (trapezoidal distance profiler, proportional heading
// corrector, blocking drive/turn/slide primitives) lives in `motion`;
// `hardware` provides the device traits plus the serial pod-bus and
// simulated backends.

pub mod config;
pub mod hardware;
pub mod messages;
pub mod motion;
