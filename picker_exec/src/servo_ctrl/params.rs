//! Parameters structure for the visual servo controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Where the target should appear in the image once the base is centred on it, and how to
/// get there.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServoTarget {
    /// Horizontal pixel at which the gripper is directly over the target. Found by trial and
    /// error for each camera mounting.
    ///
    /// Units: pixels
    pub target_x: i32,

    /// Largest error which counts as centred.
    ///
    /// Units: pixels
    pub tolerance_px: i32,

    /// Pulse length used while the target is far from the centre.
    ///
    /// Units: seconds
    pub coarse_step_s: f64,

    /// Pulse length used inside the fine zone.
    ///
    /// Units: seconds
    pub fine_step_s: f64,

    /// Errors smaller than this use the fine step.
    ///
    /// Units: pixels
    pub fine_zone_px: i32,
}

/// Parameters for the visual servo controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServoCtrlParams {
    pub target: ServoTarget,

    /// How long to wait for a confirmed detection before treating the base as stuck.
    ///
    /// Units: seconds
    pub settle_window_s: f64,

    /// Length of the reversing pulse issued when stuck.
    ///
    /// Units: seconds
    pub recovery_pulse_s: f64,

    /// Wait after every stop for the arm to stop swinging.
    ///
    /// Units: seconds
    pub stop_settle_s: f64,

    /// Number of stale frames to discard after every stop.
    pub drain_frames: usize,

    /// Consecutive stuck recoveries allowed before giving up.
    pub max_stuck_recoveries: u32,

    /// Total control iterations allowed before giving up.
    pub max_steps: u32,

    /// If true a negative error (target left of `target_x`) is corrected by rotating left.
    ///
    /// Depends on how the camera is mounted.
    pub left_on_negative_error: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ServoTarget {
    fn default() -> Self {
        Self {
            target_x: 165,
            tolerance_px: 2,
            coarse_step_s: 0.1,
            fine_step_s: 0.05,
            fine_zone_px: 50,
        }
    }
}

impl Default for ServoCtrlParams {
    fn default() -> Self {
        Self {
            target: ServoTarget::default(),
            settle_window_s: 3.0,
            recovery_pulse_s: 0.5,
            stop_settle_s: 0.5,
            drain_frames: 5,
            max_stuck_recoveries: 5,
            max_steps: 500,
            left_on_negative_error: true,
        }
    }
}
