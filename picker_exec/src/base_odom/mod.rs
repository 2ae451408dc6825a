//! # Base odometer module
//!
//! The base motor has no encoder. Its position is dead-reckoned from how long it has been driven
//! in each direction, measured from a calibration pose at the right-hand mechanical stop.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::mech::ArmCmd;
use serde::{Deserialize, Serialize};

// Internal
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance on the `left + right == total` invariant.
///
/// Units: seconds
pub const ESTIMATE_EPSILON_S: f64 = 1e-9;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction of base rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotDir {
    Left,
    Right,
}

/// Result of stopping a drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DriveUpdate {
    /// The elapsed time was applied to the estimate.
    Applied { elapsed_s: f64 },

    /// The elapsed time was longer than a full sweep of the base plus the overrun tolerance,
    /// which is physically impossible, so it was discarded and the previous estimate kept.
    Overrun { elapsed_s: f64 },
}

/// Possible errors that can occur during odometer operation.
#[derive(Debug, thiserror::Error)]
pub enum OdometerError {
    #[error("Cannot start a {0:?} drive, a {1:?} drive is already active")]
    AlreadyDriving(RotDir, RotDir),

    #[error("Cannot stop the drive as no drive is active")]
    NotDriving,

    #[error("The total rotation time must be positive and finite, found {0}")]
    InvalidTotalRotationTime(f64),

    #[error("The overrun tolerance must be non-negative and finite, found {0}")]
    InvalidOverrunTolerance(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RotDir {
    pub fn reversed(self) -> Self {
        match self {
            RotDir::Left => RotDir::Right,
            RotDir::Right => RotDir::Left,
        }
    }

    /// The base motor command which rotates in this direction.
    pub fn arm_cmd(self) -> ArmCmd {
        match self {
            RotDir::Left => ArmCmd::BASE_LEFT,
            RotDir::Right => ArmCmd::BASE_RIGHT,
        }
    }
}

impl OdometerError {
    /// True if the error comes from calling start/stop out of order.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            OdometerError::AlreadyDriving(..) | OdometerError::NotDriving
        )
    }
}
