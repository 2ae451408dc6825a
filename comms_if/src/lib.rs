//! # Communications interface crate.
//!
//! Provides the interfaces between the pick-and-place controller and the equipment of the cell:
//! the arm's actuator gateway, the camera, and the object detector.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and response definitions for equipment (like mechanisms)
pub mod eqpt;
