//! # Grasp sequencer module
//!
//! Every joint other than the base is driven blind. Motions are authored as fixed sequences of
//! (command, hold time) steps which the sequencer replays one at a time through the actuator
//! gateway, stopping the motor after each hold.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
pub mod sequences;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::rc::Rc;

use comms_if::eqpt::{
    mech::{ActuatorGateway, ArmCmd},
    EqptError,
};
use log::{debug, info, warn};
use serde::Serialize;
use util::time::Clock;

use crate::{
    base_odom::{BaseOdometer, OdometerError, RotDir},
    cancel::CancelToken,
    obj_loc::{ObjLocError, ObjectLocator},
};

pub use params::*;
pub use sequences::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One step of a sequence: drive a joint for a fixed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GraspStep {
    pub cmd: ArmCmd,

    /// Units: seconds
    pub hold_s: f64,
}

/// A named, immutable sequence of steps.
#[derive(Debug, Clone, Copy)]
pub struct Sequence {
    pub name: &'static str,

    pub steps: &'static [GraspStep],

    /// If true the base is rotated back to the calibration stop after the steps and the
    /// odometer reset.
    pub rehome_base: bool,
}

pub struct GraspSeq {
    params: GraspSeqParams,

    clock: Rc<dyn Clock>,

    cancel: CancelToken,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeqOutcome {
    Complete,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum GraspSeqError {
    #[error("Could not command the arm: {0}")]
    ActuatorError(EqptError),

    #[error("Odometer error: {0}")]
    OdometerError(OdometerError),

    #[error("Could not drain the camera: {0}")]
    ObjLocError(ObjLocError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GraspStep {
    pub const fn new(cmd: ArmCmd, hold_s: f64) -> Self {
        Self { cmd, hold_s }
    }
}

impl Sequence {
    /// Sum of all hold times, not including any base rehoming.
    pub fn duration_s(&self) -> f64 {
        self.steps.iter().map(|s| s.hold_s).sum()
    }
}

impl GraspSeq {
    pub fn new(params: GraspSeqParams, clock: Rc<dyn Clock>, cancel: CancelToken) -> Self {
        Self {
            params,
            clock,
            cancel,
        }
    }

    /// Replay `seq` through the actuator.
    ///
    /// If a locator is given its camera is drained during each hold so that the first frame
    /// after the sequence is fresh. Steps which drive the base are tracked by the odometer.
    pub fn run(
        &mut self,
        seq: &Sequence,
        actuator: &mut dyn ActuatorGateway,
        odometer: &mut BaseOdometer,
        mut locator: Option<&mut ObjectLocator>,
    ) -> Result<SeqOutcome, GraspSeqError> {
        info!("Running {} ({:.2} s)", seq.name, seq.duration_s());

        for (i, step) in seq.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return self.cancelled(seq, actuator, odometer);
            }

            debug!(
                "{} step {}/{}: {} for {:.2} s",
                seq.name,
                i + 1,
                seq.steps.len(),
                step.cmd,
                step.hold_s
            );

            let base_dir = base_dir(step.cmd);
            if let Some(dir) = base_dir {
                odometer
                    .start_drive(dir)
                    .map_err(GraspSeqError::OdometerError)?;
            }

            step.cmd
                .send(actuator)
                .map_err(GraspSeqError::ActuatorError)?;
            let start_s = self.clock.now_s();

            if let Some(loc) = locator.as_mut() {
                loc.drain(self.params.drain_frames)
                    .map_err(GraspSeqError::ObjLocError)?;
            }

            let remaining_s = step.hold_s - (self.clock.now_s() - start_s);
            let completed = self.cancel.sleep_s(self.clock.as_ref(), remaining_s);

            actuator.stop().map_err(GraspSeqError::ActuatorError)?;
            if base_dir.is_some() {
                odometer
                    .stop_drive()
                    .map_err(GraspSeqError::OdometerError)?;
            }

            if !completed {
                return self.cancelled(seq, actuator, odometer);
            }
        }

        if seq.rehome_base {
            return self.rehome_base(actuator, odometer);
        }

        Ok(SeqOutcome::Complete)
    }

    /// Rotate the base right for the odometer's remaining estimate, less the margin, and reset
    /// the odometer to the calibration baseline.
    fn rehome_base(
        &mut self,
        actuator: &mut dyn ActuatorGateway,
        odometer: &mut BaseOdometer,
    ) -> Result<SeqOutcome, GraspSeqError> {
        let dir = RotDir::Right;
        let duration_s = (odometer.remaining_time_s(dir) - self.params.return_margin_s).max(0.0);

        info!("Rehoming base: {:?} for {:.2} s", dir, duration_s);

        odometer
            .start_drive(dir)
            .map_err(GraspSeqError::OdometerError)?;
        dir.arm_cmd()
            .send(actuator)
            .map_err(GraspSeqError::ActuatorError)?;

        let completed = self.cancel.sleep_s(self.clock.as_ref(), duration_s);

        actuator.stop().map_err(GraspSeqError::ActuatorError)?;
        odometer
            .stop_drive()
            .map_err(GraspSeqError::OdometerError)?;

        if !completed {
            warn!("Rehoming cancelled, odometer not reset");
            return Ok(SeqOutcome::Cancelled);
        }

        odometer.reset_to_calibration();

        Ok(SeqOutcome::Complete)
    }

    fn cancelled(
        &self,
        seq: &Sequence,
        actuator: &mut dyn ActuatorGateway,
        odometer: &mut BaseOdometer,
    ) -> Result<SeqOutcome, GraspSeqError> {
        actuator.stop().map_err(GraspSeqError::ActuatorError)?;
        if odometer.is_driving() {
            odometer
                .stop_drive()
                .map_err(GraspSeqError::OdometerError)?;
        }

        warn!("{} cancelled", seq.name);

        Ok(SeqOutcome::Cancelled)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn base_dir(cmd: ArmCmd) -> Option<RotDir> {
    if cmd == ArmCmd::BASE_LEFT {
        Some(RotDir::Left)
    } else if cmd == ArmCmd::BASE_RIGHT {
        Some(RotDir::Right)
    } else {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
