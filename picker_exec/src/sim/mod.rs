//! # Simulated cell
//!
//! A deterministic stand-in for the arm, camera and detector. Everything runs on a shared
//! [`SimClock`] which advances when the controller sleeps and when a frame is acquired, so a full
//! pick-and-place run completes in milliseconds of wall time.
//!
//! The world is one dimensional: the object sits at a base position, expressed like the
//! odometer's estimate as the drive time from the left-hand stop, and appears in the image at a
//! horizontal pixel offset proportional to the base's distance from it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod arm;
mod cam;
mod world;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{cell::RefCell, rc::Rc};

use comms_if::eqpt::EqptError;
use serde::Deserialize;
use util::time::SimClock;

pub use arm::SimArm;
pub use cam::{ScriptedDetector, SimCamera, WorldDetector};
pub use world::SimWorld;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// World state shared between the simulated devices.
pub type SharedWorld = Rc<RefCell<SimWorld>>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated cell.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Time taken to acquire one frame.
    ///
    /// Units: seconds
    pub frame_period_s: f64,

    /// Units: pixels
    pub frame_width_px: u32,

    /// Units: pixels
    pub frame_height_px: u32,

    /// Number of frames after which the camera stream ends, `None` for an endless stream.
    pub max_frames: Option<usize>,

    /// Physical stop-to-stop rotation time of the simulated base.
    ///
    /// Units: seconds
    pub total_rotation_time_s: f64,

    /// Position of the object, as drive time from the left-hand stop.
    ///
    /// Units: seconds
    pub object_base_pos_s: f64,

    /// Horizontal image shift per second of base rotation.
    ///
    /// Units: pixels/second
    pub px_per_s: f64,

    /// Horizontal pixel at which the object appears when the gripper is directly over it.
    pub camera_centre_px: f64,

    /// Units: pixels
    pub object_width_px: i32,

    /// Largest base misalignment at which closing the grip captures the object.
    ///
    /// Units: seconds
    pub grasp_tolerance_s: f64,

    /// The shoulder must have been lowered by at least this drive time for the grip to reach
    /// the object.
    ///
    /// Units: seconds
    pub grasp_min_shoulder_drop_s: f64,

    /// Number of grasps which slip before one succeeds.
    pub failed_grasps: u32,

    /// Whether opening the arm gateway succeeds.
    pub arm_available: bool,

    /// Whether opening the camera succeeds.
    pub camera_available: bool,
}

/// The simulated cell, from which the individual devices are opened.
pub struct SimCell {
    pub clock: SimClock,

    pub world: SharedWorld,

    params: SimParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            frame_period_s: 1.0 / 30.0,
            frame_width_px: 320,
            frame_height_px: 240,
            max_frames: None,
            total_rotation_time_s: 16.5,
            object_base_pos_s: 9.0,
            px_per_s: 60.0,
            camera_centre_px: 165.0,
            object_width_px: 60,
            grasp_tolerance_s: 0.15,
            grasp_min_shoulder_drop_s: 1.0,
            failed_grasps: 0,
            arm_available: true,
            camera_available: true,
        }
    }
}

impl SimCell {
    /// Create a new cell with the arm at the calibration pose.
    pub fn new(params: SimParams) -> Self {
        let clock = SimClock::new();
        let world = Rc::new(RefCell::new(SimWorld::new(clock.clone(), &params)));

        Self {
            clock,
            world,
            params,
        }
    }

    /// Open the arm's actuator gateway.
    pub fn open_arm(&self) -> Result<SimArm, EqptError> {
        if !self.params.arm_available {
            return Err(EqptError::DeviceUnavailable(
                "actuator gateway",
                "simulated arm is disconnected".into(),
            ));
        }

        Ok(SimArm::new(self.world.clone()))
    }

    /// Open the camera.
    pub fn open_camera(&self) -> Result<SimCamera, EqptError> {
        if !self.params.camera_available {
            return Err(EqptError::DeviceUnavailable(
                "camera",
                "simulated camera is disconnected".into(),
            ));
        }

        Ok(SimCamera::new(self.clock.clone(), &self.params))
    }

    /// Detector which sees the simulated object.
    pub fn world_detector(&self) -> WorldDetector {
        WorldDetector::new(self.world.clone())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unavailable_devices() {
        let cell = SimCell::new(SimParams {
            arm_available: false,
            ..SimParams::default()
        });

        match cell.open_arm() {
            Err(EqptError::DeviceUnavailable(..)) => (),
            Err(e) => panic!("Unexpected error {}", e),
            Ok(_) => panic!("Expected the arm to be unavailable"),
        }
        assert!(cell.open_camera().is_ok());
    }

    #[test]
    fn test_load_shipped_params() {
        let params: SimParams = util::params::load_from_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/sim.toml"
        ))
        .unwrap();

        assert_eq!(params.failed_grasps, 1);
        assert_eq!(params.max_frames, None);
    }
}
