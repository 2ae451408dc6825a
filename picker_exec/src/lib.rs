//! # Pick-and-place library.
//!
//! Control software for a vision-guided pick-and-place cell built around an arm with no joint
//! position sensing. Only the base has feedback, through a camera and object detector; every
//! other joint is driven open-loop by time.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Base odometer - dead-reckons the base rotation from accumulated drive time
pub mod base_odom;

/// Cooperative cancellation of the control loop
pub mod cancel;

/// Grasp sequencer - replays authored timed joint sequences
pub mod grasp_seq;

/// Object locator - turns detector output into a single target position
pub mod obj_loc;

/// Pick manager - the top level pick-and-place state machine
pub mod pick_mgr;

/// Simulated cell used by the executable and the tests
pub mod sim;

/// Servo control - centres the base on the target with bang-bang pulses
pub mod servo_ctrl;

/// Start triggers
pub mod trigger;
