//! # Equipment Interface
//!
//! This module defines the interface structures and traits the controller uses to talk to the
//! equipment of the cell. Wire encodings are left to the implementors.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cam;
pub mod mech;

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Errors raised by equipment implementations.
#[derive(Debug, thiserror::Error)]
pub enum EqptError {
    #[error("The {0} is not available: {1}")]
    DeviceUnavailable(&'static str, String),

    #[error("Could not send a command to the {0}: {1}")]
    CommandFailed(&'static str, String),

    #[error("Could not acquire a frame from the camera: {0}")]
    AcquisitionFailed(String),
}
