//! # Visual servo control module
//!
//! Centres the base over the target using the camera as the only position sensor. The base
//! motor is either on or off, so the controller is bang-bang: it stops, looks, and then pulses the
//! base towards the target for a fixed time, shortening the pulse as the target nears the centre.
//!
//! If the target cannot be seen after a stop the base is assumed to be stuck (usually against a
//! mechanical stop or having overshot the target) and is pulsed back the way it came.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::EqptError;
use serde::Serialize;

use crate::base_odom::OdometerError;
use crate::obj_loc::ObjLocError;

// Internal
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Final result of a centring attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServoOutcome {
    /// The target is within tolerance at the given horizontal pixel.
    Centered(i32),

    /// Centring was given up.
    Aborted(AbortCause),
}

/// Why centring was given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortCause {
    /// Too many consecutive stuck recoveries.
    StuckLimit,

    /// Too many control iterations.
    StepLimit,

    /// The run was cancelled.
    Cancelled,
}

/// Possible errors that can occur during servo control.
#[derive(Debug, thiserror::Error)]
pub enum ServoCtrlError {
    #[error("Odometer error: {0}")]
    OdometerError(OdometerError),

    #[error("Object locator error: {0}")]
    ObjLocError(ObjLocError),

    #[error("Could not command the base: {0}")]
    ActuatorError(EqptError),
}
