//! # Cycle report
//!
//! Summary of one run of the pick manager, saved into the session directory when the run ends.

use serde::Serialize;

use super::CycleState;
use crate::{base_odom::RotationState, servo_ctrl::AbortCause};

/// Summary of a pick-and-place cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub final_state: CycleState,

    /// Why the cycle failed, `None` unless `final_state` is `Failed`.
    pub failure: Option<FailureCause>,

    /// Every state entered, in order, starting with `Idle`.
    pub states_visited: Vec<CycleState>,

    /// Number of times `PICK_UP` was run.
    pub grasp_attempts: u32,

    /// Pixel position of the target at the last successful centring.
    pub centred_at_px: Option<i32>,

    /// Number of base drives discarded by the odometer as overruns.
    pub odometer_overruns: u32,

    /// Odometer state at the end of the cycle.
    pub final_estimate: RotationState,

    /// Units: seconds
    pub started_at_s: f64,

    /// Units: seconds
    pub duration_s: f64,
}

/// Why a cycle ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FailureCause {
    /// Neither scanning sweep found the object.
    ObjectNotFound,

    /// The servo controller gave up.
    CenteringAborted(AbortCause),

    /// The object was still visible after every permitted grasp attempt.
    GraspRetriesExhausted,

    /// The run was cancelled.
    Cancelled,

    /// A component returned an error.
    ComponentError(String),
}

impl CycleReport {
    pub(super) fn new(started_at_s: f64, estimate: RotationState) -> Self {
        Self {
            final_state: CycleState::Idle,
            failure: None,
            states_visited: vec![CycleState::Idle],
            grasp_attempts: 0,
            centred_at_px: None,
            odometer_overruns: estimate.overrun_count,
            final_estimate: estimate,
            started_at_s,
            duration_s: 0.0,
        }
    }
}
