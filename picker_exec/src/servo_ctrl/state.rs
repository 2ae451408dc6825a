//! Implementation of the visual servo controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::rc::Rc;

// Internal
use super::{AbortCause, ServoCtrlError, ServoCtrlParams, ServoOutcome, ServoTarget};
use crate::{
    base_odom::{BaseOdometer, RotDir},
    cancel::CancelToken,
    obj_loc::ObjectLocator,
};
use comms_if::eqpt::mech::ActuatorGateway;
use util::time::Clock;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Visual servo controller.
///
/// Holds no state between calls to [`ServoCtrl::center_on_target`]; the actuator, odometer and
/// locator are lent to it for the duration of a call.
pub struct ServoCtrl {
    params: ServoCtrlParams,

    clock: Rc<dyn Clock>,

    cancel: CancelToken,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ServoCtrl {
    pub fn new(params: ServoCtrlParams, clock: Rc<dyn Clock>, cancel: CancelToken) -> Self {
        Self {
            params,
            clock,
            cancel,
        }
    }

    /// Drive the base until the target appears within tolerance of `target.target_x`.
    ///
    /// The base is stopped on every return path, including errors raised after the first stop.
    pub fn center_on_target(
        &mut self,
        locator: &mut ObjectLocator,
        actuator: &mut dyn ActuatorGateway,
        odometer: &mut BaseOdometer,
        target: &ServoTarget,
    ) -> Result<ServoOutcome, ServoCtrlError> {
        let result = self.servo_loop(locator, actuator, odometer, target);

        if result.is_err() {
            // Best effort, the servo error is the one returned
            if let Err(e) = stop_base(actuator, odometer) {
                warn!("Could not stop the base after a servo error: {}", e);
            }
        }

        result
    }

    fn servo_loop(
        &mut self,
        locator: &mut ObjectLocator,
        actuator: &mut dyn ActuatorGateway,
        odometer: &mut BaseOdometer,
        target: &ServoTarget,
    ) -> Result<ServoOutcome, ServoCtrlError> {
        let mut num_steps = 0;
        let mut num_stuck = 0;

        info!("Centring on target at x = {} px", target.target_x);

        loop {
            if self.cancel.is_cancelled() {
                stop_base(actuator, odometer)?;
                info!("Centring cancelled");
                return Ok(ServoOutcome::Aborted(AbortCause::Cancelled));
            }

            if num_steps >= self.params.max_steps {
                stop_base(actuator, odometer)?;
                warn!("Centring gave up after {} steps", num_steps);
                return Ok(ServoOutcome::Aborted(AbortCause::StepLimit));
            }
            num_steps += 1;

            // Stop and let the arm settle before looking
            stop_base(actuator, odometer)?;
            self.clock.sleep_s(self.params.stop_settle_s);
            locator
                .drain(self.params.drain_frames)
                .map_err(ServoCtrlError::ObjLocError)?;

            let det = locator
                .wait_for_detection_cancellable(self.params.settle_window_s, &self.cancel)
                .map_err(ServoCtrlError::ObjLocError)?;

            if self.cancel.is_cancelled() {
                continue;
            }

            let det = match det {
                Some(d) => d,
                None => {
                    if num_stuck >= self.params.max_stuck_recoveries {
                        warn!(
                            "Target lost after {} stuck recoveries, giving up",
                            num_stuck
                        );
                        return Ok(ServoOutcome::Aborted(AbortCause::StuckLimit));
                    }
                    num_stuck += 1;

                    // Back off the way we came
                    let dir = odometer
                        .last_dir()
                        .map(RotDir::reversed)
                        .unwrap_or(RotDir::Right);

                    warn!(
                        "No target within {:.2} s, stuck recovery {}/{}: pulsing {:?} for {:.2} s",
                        self.params.settle_window_s,
                        num_stuck,
                        self.params.max_stuck_recoveries,
                        dir,
                        self.params.recovery_pulse_s
                    );

                    self.pulse(actuator, odometer, dir, self.params.recovery_pulse_s)?;
                    continue;
                }
            };
            num_stuck = 0;

            let error = det.x_centre.saturating_sub(target.target_x);

            if error.saturating_abs() <= target.tolerance_px {
                info!("Centred, target at x = {} px", det.x_centre);
                return Ok(ServoOutcome::Centered(det.x_centre));
            }

            let dir = match (error < 0, self.params.left_on_negative_error) {
                (true, true) | (false, false) => RotDir::Left,
                _ => RotDir::Right,
            };

            let step_s = if error.saturating_abs() < target.fine_zone_px {
                target.fine_step_s
            } else {
                target.coarse_step_s
            };

            debug!(
                "Target at x = {} px (error {} px), pulsing {:?} for {:.2} s",
                det.x_centre, error, dir, step_s
            );

            self.pulse(actuator, odometer, dir, step_s)?;
        }
    }

    /// Start the base in `dir` and wait. The drive is left running, the caller stops it.
    fn pulse(
        &self,
        actuator: &mut dyn ActuatorGateway,
        odometer: &mut BaseOdometer,
        dir: RotDir,
        duration_s: f64,
    ) -> Result<(), ServoCtrlError> {
        odometer
            .start_drive(dir)
            .map_err(ServoCtrlError::OdometerError)?;
        dir.arm_cmd()
            .send(actuator)
            .map_err(ServoCtrlError::ActuatorError)?;

        self.clock.sleep_s(duration_s);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Stop the base motor and close off any active odometer drive.
pub fn stop_base(
    actuator: &mut dyn ActuatorGateway,
    odometer: &mut BaseOdometer,
) -> Result<(), ServoCtrlError> {
    actuator.stop().map_err(ServoCtrlError::ActuatorError)?;

    if odometer.is_driving() {
        odometer
            .stop_drive()
            .map_err(ServoCtrlError::OdometerError)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        base_odom::BaseOdomParams,
        obj_loc::ObjLocParams,
        sim::{ScriptedDetector, SimArm, SimCamera, SimCell, SimParams},
    };
    use comms_if::eqpt::{
        cam::{CamImage, Camera, Detector},
        mech::ArmCmd,
        EqptError,
    };
    use util::time::SimClock;

    struct Harness {
        cell: SimCell,
        arm: SimArm,
        odometer: BaseOdometer,
        clock: Rc<dyn Clock>,
        cancel: CancelToken,
    }

    fn harness(sim_params: SimParams) -> Harness {
        let cell = SimCell::new(sim_params);
        let arm = cell.open_arm().unwrap();
        let clock: Rc<dyn Clock> = Rc::new(cell.clock.clone());
        let odometer = BaseOdometer::new(BaseOdomParams::default(), clock.clone()).unwrap();

        Harness {
            cell,
            arm,
            odometer,
            clock,
            cancel: CancelToken::new(),
        }
    }

    impl Harness {
        fn locator(&self, camera: Box<dyn Camera>, detector: Box<dyn Detector>) -> ObjectLocator {
            ObjectLocator::new(ObjLocParams::default(), camera, detector, self.clock.clone())
        }

        fn sim_camera(&self) -> Box<dyn Camera> {
            Box::new(self.cell.open_camera().unwrap())
        }

        fn base_drives(&self) -> Vec<ArmCmd> {
            self.cell
                .world
                .borrow()
                .drive_log
                .iter()
                .copied()
                .filter(|c| *c == ArmCmd::BASE_LEFT || *c == ArmCmd::BASE_RIGHT)
                .collect()
        }
    }

    /// Camera which cancels the run once the clock passes a given time.
    struct CancellingCamera {
        inner: SimCamera,
        clock: SimClock,
        cancel: CancelToken,
        cancel_at_s: f64,
    }

    impl Camera for CancellingCamera {
        fn next_frame(&mut self) -> Result<Option<CamImage>, EqptError> {
            let frame = self.inner.next_frame();
            if self.clock.now_s() >= self.cancel_at_s {
                self.cancel.cancel();
            }
            frame
        }

        fn drain(&mut self, num_frames: usize) -> Result<(), EqptError> {
            self.inner.drain(num_frames)
        }
    }

    #[test]
    fn test_centred_without_driving() {
        let mut h = harness(SimParams::default());
        let target = ServoTarget::default();
        let mut loc = h.locator(
            h.sim_camera(),
            Box::new(ScriptedDetector::new(vec![Some(
                target.target_x + target.tolerance_px - 1,
            )])),
        );
        let mut servo = ServoCtrl::new(ServoCtrlParams::default(), h.clock.clone(), h.cancel.clone());

        let outcome = servo
            .center_on_target(&mut loc, &mut h.arm, &mut h.odometer, &target)
            .unwrap();

        assert_eq!(
            outcome,
            ServoOutcome::Centered(target.target_x + target.tolerance_px - 1)
        );
        assert!(h.cell.world.borrow().drive_log.is_empty());
        assert!(h.cell.world.borrow().stop_count >= 1);
    }

    #[test]
    fn test_far_right_target_never_drives_left() {
        let mut h = harness(SimParams::default());
        let target = ServoTarget::default();
        let mut loc = h.locator(
            h.sim_camera(),
            Box::new(ScriptedDetector::new(vec![Some(target.target_x + 1000)])),
        );
        let params = ServoCtrlParams {
            max_steps: 20,
            ..ServoCtrlParams::default()
        };
        let mut servo = ServoCtrl::new(params, h.clock.clone(), h.cancel.clone());

        let outcome = servo
            .center_on_target(&mut loc, &mut h.arm, &mut h.odometer, &target)
            .unwrap();

        assert_eq!(outcome, ServoOutcome::Aborted(AbortCause::StepLimit));
        let drives = h.base_drives();
        assert_eq!(drives.len(), 20);
        assert!(drives.iter().all(|c| *c == ArmCmd::BASE_RIGHT));
        assert!(!h.odometer.is_driving());
        assert!(h.cell.world.borrow().active_cmd().is_none());
    }

    #[test]
    fn test_extreme_left_box_drives_left() {
        let mut h = harness(SimParams::default());
        let target = ServoTarget::default();
        let mut loc = h.locator(
            h.sim_camera(),
            Box::new(ScriptedDetector::new(vec![Some(i32::MIN + 100)])),
        );
        let params = ServoCtrlParams {
            max_steps: 5,
            ..ServoCtrlParams::default()
        };
        let mut servo = ServoCtrl::new(params, h.clock.clone(), h.cancel.clone());

        let outcome = servo
            .center_on_target(&mut loc, &mut h.arm, &mut h.odometer, &target)
            .unwrap();

        assert_eq!(outcome, ServoOutcome::Aborted(AbortCause::StepLimit));
        let drives = h.base_drives();
        assert_eq!(drives.len(), 5);
        assert!(drives.iter().all(|c| *c == ArmCmd::BASE_LEFT));
    }

    #[test]
    fn test_stuck_recovery_reverses_until_cancelled() {
        let mut h = harness(SimParams::default());
        let params = ServoCtrlParams {
            settle_window_s: 1.0,
            recovery_pulse_s: 0.5,
            stop_settle_s: 0.5,
            ..ServoCtrlParams::default()
        };

        // The base was last scanning left when the target was lost
        h.odometer.start_drive(RotDir::Left).unwrap();
        ArmCmd::BASE_LEFT.send(&mut h.arm).unwrap();
        h.clock.sleep_s(1.0);

        // Two full stuck cycles take about 4 s from here, cancel part way through the third
        let camera = CancellingCamera {
            inner: h.cell.open_camera().unwrap(),
            clock: h.cell.clock.clone(),
            cancel: h.cancel.clone(),
            cancel_at_s: 5.2,
        };
        let mut loc = h.locator(Box::new(camera), Box::new(ScriptedDetector::new(vec![None])));
        let mut servo = ServoCtrl::new(params, h.clock.clone(), h.cancel.clone());

        let outcome = servo
            .center_on_target(&mut loc, &mut h.arm, &mut h.odometer, &ServoTarget::default())
            .unwrap();

        assert_eq!(outcome, ServoOutcome::Aborted(AbortCause::Cancelled));
        assert_eq!(
            h.base_drives(),
            vec![ArmCmd::BASE_LEFT, ArmCmd::BASE_RIGHT, ArmCmd::BASE_LEFT]
        );
        assert!(!h.odometer.is_driving());
    }

    #[test]
    fn test_stuck_limit() {
        let mut h = harness(SimParams::default());
        let params = ServoCtrlParams {
            settle_window_s: 0.5,
            max_stuck_recoveries: 2,
            ..ServoCtrlParams::default()
        };
        let mut loc = h.locator(h.sim_camera(), Box::new(ScriptedDetector::new(vec![None])));
        let mut servo = ServoCtrl::new(params, h.clock.clone(), h.cancel.clone());

        let outcome = servo
            .center_on_target(&mut loc, &mut h.arm, &mut h.odometer, &ServoTarget::default())
            .unwrap();

        assert_eq!(outcome, ServoOutcome::Aborted(AbortCause::StuckLimit));

        // Never driven before, so the first recovery goes right
        assert_eq!(
            h.base_drives(),
            vec![ArmCmd::BASE_RIGHT, ArmCmd::BASE_LEFT]
        );
    }

    #[test]
    fn test_closed_loop_against_world() {
        let mut h = harness(SimParams {
            object_base_pos_s: 15.0,
            ..SimParams::default()
        });
        let detector = h.cell.world_detector();
        let mut loc = h.locator(h.sim_camera(), Box::new(detector));
        let target = ServoTarget::default();
        let mut servo = ServoCtrl::new(ServoCtrlParams::default(), h.clock.clone(), h.cancel.clone());

        let outcome = servo
            .center_on_target(&mut loc, &mut h.arm, &mut h.odometer, &target)
            .unwrap();

        match outcome {
            ServoOutcome::Centered(x) => assert!((x - target.target_x).abs() <= target.tolerance_px),
            o => panic!("Expected to centre, got {:?}", o),
        }

        // Dead reckoning agrees with the simulated base
        let world_pos_s = h.cell.world.borrow().base_pos_s();
        let (left_s, right_s) = h.odometer.current_estimate();
        assert!((left_s - world_pos_s).abs() < 1e-6);
        assert!((left_s + right_s - 16.5).abs() < 1e-9);
        assert!((world_pos_s - 15.0).abs() < 0.1);
    }
}
