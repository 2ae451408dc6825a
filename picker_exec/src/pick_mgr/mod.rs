//! # Pick manager module
//!
//! Implements the [`PickMgr`] state machine, which runs one pick-and-place cycle:
//!
//! - `Idle` - Waiting for the start trigger.
//! - `Scanning` - Sweeping the base until the object is seen, reversing once.
//! - `Centering` - Servoing the base over the object.
//! - `Grasping` - Running `PICK_UP`.
//! - `Verifying` - Checking the object has left the camera's view. If not, `UNDO_PICK_UP` is run
//!   and the grasp retried from `Centering`, up to the retry ceiling.
//! - `Transporting` - Carrying the object toward the drop zone stop, for at most a full rotation
//!   less the transport margin.
//! - `Releasing` - Running `PUT_DOWN`.
//! - `Returning` - Running `RETURN_TO_CALIBRATION`.
//! - `Done`, `Failed` - Terminal. [`PickMgr::rearm`] returns to `Idle`.
//!
//! Any error from a component stops the arm and fails the cycle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod report;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::rc::Rc;

use comms_if::eqpt::{
    cam::{Camera, Detector},
    mech::ActuatorGateway,
    EqptError,
};
use log::{error, info, warn};
use serde::Serialize;
use util::time::Clock;

use crate::{
    base_odom::{BaseOdometer, OdometerError, RotDir},
    cancel::CancelToken,
    grasp_seq::{
        GraspSeq, GraspSeqError, SeqOutcome, Sequence, PICK_UP, PUT_DOWN, RETURN_TO_CALIBRATION,
        UNDO_PICK_UP,
    },
    obj_loc::{ObjLocError, ObjectLocator},
    servo_ctrl::{AbortCause, ServoCtrl, ServoCtrlError, ServoOutcome},
    trigger::Trigger,
};

pub use params::PickMgrParams;
pub use report::{CycleReport, FailureCause};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pick-and-place manager.
///
/// Owns the actuator gateway and the odometer, lending them to the servo controller and the
/// sequencer for the duration of a state.
pub struct PickMgr {
    params: PickMgrParams,

    state: CycleState,

    actuator: Box<dyn ActuatorGateway>,

    odometer: BaseOdometer,

    locator: ObjectLocator,

    servo: ServoCtrl,

    seq: GraspSeq,

    trigger: Box<dyn Trigger>,

    clock: Rc<dyn Clock>,

    cancel: CancelToken,

    /// Number of failed grasps in this cycle.
    num_retries: u32,

    /// True once the first scanning sweep has found nothing.
    scan_reversed: bool,

    report: CycleReport,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleState {
    Idle,
    Scanning,
    Centering,
    Grasping,
    Verifying,
    Transporting,
    Releasing,
    Returning,
    Done,
    Failed,
}

/// Errors that can occur in the pick manager.
#[derive(Debug, thiserror::Error)]
pub enum PickMgrError {
    #[error("Odometer error: {0}")]
    OdometerError(OdometerError),

    #[error("Object locator error: {0}")]
    ObjLocError(ObjLocError),

    #[error("Servo control error: {0}")]
    ServoCtrlError(ServoCtrlError),

    #[error("Grasp sequence error: {0}")]
    GraspSeqError(GraspSeqError),

    #[error("Could not command the arm: {0}")]
    ActuatorError(EqptError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleState::Done | CycleState::Failed)
    }
}

impl PickMgr {
    /// Create a new manager in `Idle`, with the arm assumed to be at the calibration pose.
    pub fn new(
        params: PickMgrParams,
        actuator: Box<dyn ActuatorGateway>,
        camera: Box<dyn Camera>,
        detector: Box<dyn Detector>,
        trigger: Box<dyn Trigger>,
        clock: Rc<dyn Clock>,
        cancel: CancelToken,
    ) -> Result<Self, PickMgrError> {
        let odometer = BaseOdometer::new(params.base_odom.clone(), clock.clone())
            .map_err(PickMgrError::OdometerError)?;
        let locator = ObjectLocator::new(params.obj_loc.clone(), camera, detector, clock.clone());
        let servo = ServoCtrl::new(params.servo_ctrl.clone(), clock.clone(), cancel.clone());
        let seq = GraspSeq::new(params.grasp_seq.clone(), clock.clone(), cancel.clone());
        let report = CycleReport::new(clock.now_s(), *odometer.state());

        Ok(Self {
            params,
            state: CycleState::Idle,
            actuator,
            odometer,
            locator,
            servo,
            seq,
            trigger,
            clock,
            cancel,
            num_retries: 0,
            scan_reversed: false,
            report,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn odometer(&self) -> &BaseOdometer {
        &self.odometer
    }

    pub fn report(&self) -> &CycleReport {
        &self.report
    }

    /// Execute the current state once and return the new state.
    ///
    /// Terminal states are left unchanged.
    pub fn step(&mut self) -> CycleState {
        let state = self.state;

        if state.is_terminal() {
            return state;
        }

        let next = if self.cancel.is_cancelled() {
            info!("Cycle cancelled in {:?}", state);
            self.fail(FailureCause::Cancelled)
        } else {
            match self.step_state(state) {
                Ok(s) => s,
                Err(e) => {
                    error!("Error in {:?}: {}", state, e);
                    self.fail(FailureCause::ComponentError(e.to_string()))
                }
            }
        };

        if next == CycleState::Failed {
            self.make_safe();
        }

        if next != state {
            info!("CycleState: {:?} -> {:?}", state, next);
            self.report.states_visited.push(next);
        }

        self.state = next;

        if next.is_terminal() {
            self.finish_report();
        }

        next
    }

    /// Step until a terminal state is reached, returning the report of the cycle.
    pub fn run(&mut self) -> CycleReport {
        while !self.step().is_terminal() {}

        self.report.clone()
    }

    /// Return a finished cycle to `Idle` if the trigger reads true.
    pub fn rearm(&mut self) -> CycleState {
        if !self.state.is_terminal() {
            warn!("Cannot rearm while in {:?}", self.state);
            return self.state;
        }

        if self.trigger.poll_boolean() {
            info!("Rearmed from {:?}", self.state);

            self.cancel.reset();
            self.num_retries = 0;
            self.scan_reversed = false;
            self.report = CycleReport::new(self.clock.now_s(), *self.odometer.state());
            self.state = CycleState::Idle;
        }

        self.state
    }

    /// Stop the arm and close any active odometer drive. Errors are logged, not returned.
    pub fn make_safe(&mut self) {
        if let Err(e) = self.actuator.stop() {
            error!("Could not stop the arm: {}", e);
        }

        if self.odometer.is_driving() {
            if let Err(e) = self.odometer.stop_drive() {
                error!("Could not stop the odometer drive: {}", e);
            }
        }
    }

    fn step_state(&mut self, state: CycleState) -> Result<CycleState, PickMgrError> {
        match state {
            CycleState::Idle => self.idle(),
            CycleState::Scanning => self.scan(),
            CycleState::Centering => self.centre(),
            CycleState::Grasping => self.grasp(),
            CycleState::Verifying => self.verify(),
            CycleState::Transporting => self.transport(),
            CycleState::Releasing => self.run_then(&PUT_DOWN, CycleState::Returning),
            CycleState::Returning => self.run_then(&RETURN_TO_CALIBRATION, CycleState::Done),
            CycleState::Done | CycleState::Failed => Ok(state),
        }
    }

    fn idle(&mut self) -> Result<CycleState, PickMgrError> {
        if self.trigger.poll_boolean() {
            info!("Start triggered");
            return Ok(CycleState::Scanning);
        }

        self.cancel
            .sleep_s(self.clock.as_ref(), self.params.trigger_poll_period_s);

        Ok(CycleState::Idle)
    }

    fn scan(&mut self) -> Result<CycleState, PickMgrError> {
        let dir = if self.scan_reversed {
            self.params.scan_dir.reversed()
        } else {
            self.params.scan_dir
        };

        info!(
            "Scanning {:?} for up to {:.2} s",
            dir, self.params.full_sweep_time_s
        );

        self.start_base(dir)?;
        let det = self
            .locator
            .wait_for_detection_cancellable(self.params.full_sweep_time_s, &self.cancel);
        self.stop_base()?;

        let det = det.map_err(PickMgrError::ObjLocError)?;

        if self.cancel.is_cancelled() {
            return Ok(self.fail(FailureCause::Cancelled));
        }

        match det {
            Some(d) => {
                info!("Object found at x = {} px", d.x_centre);
                self.scan_reversed = false;
                Ok(CycleState::Centering)
            }
            None if !self.scan_reversed => {
                warn!("Object not found, reversing the sweep");
                self.scan_reversed = true;
                Ok(CycleState::Scanning)
            }
            None => {
                error!("Object not found in either sweep direction");
                Ok(self.fail(FailureCause::ObjectNotFound))
            }
        }
    }

    fn centre(&mut self) -> Result<CycleState, PickMgrError> {
        let target = self.params.servo_ctrl.target.clone();

        let outcome = self
            .servo
            .center_on_target(
                &mut self.locator,
                self.actuator.as_mut(),
                &mut self.odometer,
                &target,
            )
            .map_err(PickMgrError::ServoCtrlError)?;

        match outcome {
            ServoOutcome::Centered(x) => {
                self.report.centred_at_px = Some(x);
                Ok(CycleState::Grasping)
            }
            ServoOutcome::Aborted(AbortCause::Cancelled) => Ok(self.fail(FailureCause::Cancelled)),
            ServoOutcome::Aborted(cause) => {
                error!("Centring aborted: {:?}", cause);
                Ok(self.fail(FailureCause::CenteringAborted(cause)))
            }
        }
    }

    fn grasp(&mut self) -> Result<CycleState, PickMgrError> {
        self.report.grasp_attempts += 1;
        info!("Grasp attempt {}", self.report.grasp_attempts);

        self.run_then(&PICK_UP, CycleState::Verifying)
    }

    fn verify(&mut self) -> Result<CycleState, PickMgrError> {
        let det = self
            .locator
            .wait_for_detection_cancellable(self.params.verify_window_s, &self.cancel)
            .map_err(PickMgrError::ObjLocError)?;

        if self.cancel.is_cancelled() {
            return Ok(self.fail(FailureCause::Cancelled));
        }

        let det = match det {
            Some(d) => d,
            None => {
                info!("Object no longer visible, grasp succeeded");
                return Ok(CycleState::Transporting);
            }
        };

        warn!(
            "Object still visible at x = {} px, grasp failed",
            det.x_centre
        );

        if self.run_seq(&UNDO_PICK_UP)? == SeqOutcome::Cancelled {
            return Ok(self.fail(FailureCause::Cancelled));
        }

        self.num_retries += 1;

        if self.num_retries <= self.params.grasp_retry_ceiling {
            info!(
                "Retrying grasp ({}/{})",
                self.num_retries, self.params.grasp_retry_ceiling
            );
            Ok(CycleState::Centering)
        } else {
            error!(
                "Grasp failed {} times, giving up",
                self.report.grasp_attempts
            );
            Ok(self.fail(FailureCause::GraspRetriesExhausted))
        }
    }

    fn transport(&mut self) -> Result<CycleState, PickMgrError> {
        let dir = self.params.drop_zone_dir;
        let max_s =
            (self.odometer.total_rotation_time_s() - self.params.transport_margin_s).max(0.0);
        let duration_s = self.odometer.remaining_time_s(dir).min(max_s);

        info!("Transporting {:?} for {:.2} s", dir, duration_s);

        self.start_base(dir)?;
        let completed = self.cancel.sleep_s(self.clock.as_ref(), duration_s);
        self.stop_base()?;

        if !completed {
            return Ok(self.fail(FailureCause::Cancelled));
        }

        Ok(CycleState::Releasing)
    }

    /// Run `seq`, moving to `next` if it completes.
    fn run_then(&mut self, seq: &Sequence, next: CycleState) -> Result<CycleState, PickMgrError> {
        match self.run_seq(seq)? {
            SeqOutcome::Complete => Ok(next),
            SeqOutcome::Cancelled => Ok(self.fail(FailureCause::Cancelled)),
        }
    }

    fn run_seq(&mut self, seq: &Sequence) -> Result<SeqOutcome, PickMgrError> {
        self.seq
            .run(
                seq,
                self.actuator.as_mut(),
                &mut self.odometer,
                Some(&mut self.locator),
            )
            .map_err(PickMgrError::GraspSeqError)
    }

    fn start_base(&mut self, dir: RotDir) -> Result<(), PickMgrError> {
        self.odometer
            .start_drive(dir)
            .map_err(PickMgrError::OdometerError)?;
        dir.arm_cmd()
            .send(self.actuator.as_mut())
            .map_err(PickMgrError::ActuatorError)
    }

    fn stop_base(&mut self) -> Result<(), PickMgrError> {
        self.actuator.stop().map_err(PickMgrError::ActuatorError)?;
        self.odometer
            .stop_drive()
            .map_err(PickMgrError::OdometerError)?;

        Ok(())
    }

    fn fail(&mut self, cause: FailureCause) -> CycleState {
        self.report.failure = Some(cause);
        CycleState::Failed
    }

    fn finish_report(&mut self) {
        let estimate = *self.odometer.state();

        self.report.final_state = self.state;
        self.report.odometer_overruns = estimate.overrun_count;
        self.report.final_estimate = estimate;
        self.report.duration_s = self.clock.now_s() - self.report.started_at_s;

        info!(
            "Cycle finished in {:?} after {:.2} s, {} grasp attempt(s)",
            self.state, self.report.duration_s, self.report.grasp_attempts
        );
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        sim::{ScriptedDetector, SimCell, SimParams},
        trigger::ImmediateTrigger,
    };
    use util::time::SimClock;

    /// Simulated clock whose sleeps always run late by a fixed amount, like a loaded wall clock.
    struct LateClock {
        inner: SimClock,
        late_s: f64,
    }

    impl Clock for LateClock {
        fn now_s(&self) -> f64 {
            self.inner.now_s()
        }

        fn sleep_s(&self, duration_s: f64) {
            self.inner.sleep_s(duration_s);
            self.inner.advance_s(self.late_s);
        }
    }

    /// Parameters for runs against a scripted detector, where the servo never needs to settle.
    fn scripted_params() -> PickMgrParams {
        let mut params = PickMgrParams::default();
        params.servo_ctrl.target.target_x = 160;
        params.servo_ctrl.target.tolerance_px = 5;
        params.servo_ctrl.stop_settle_s = 0.0;
        params.obj_loc.min_consec_detections = 1;
        params
    }

    fn mgr(
        cell: &SimCell,
        params: PickMgrParams,
        detector: Box<dyn Detector>,
        trigger: Box<dyn Trigger>,
        cancel: CancelToken,
    ) -> PickMgr {
        PickMgr::new(
            params,
            Box::new(cell.open_arm().unwrap()),
            Box::new(cell.open_camera().unwrap()),
            detector,
            trigger,
            Rc::new(cell.clock.clone()),
            cancel,
        )
        .unwrap()
    }

    #[test]
    fn test_scripted_cycle_completes() {
        let cell = SimCell::new(SimParams::default());
        let detector = ScriptedDetector::new(vec![None, None, Some(160), Some(160), None]);
        let mut mgr = mgr(
            &cell,
            scripted_params(),
            Box::new(detector),
            Box::new(ImmediateTrigger),
            CancelToken::new(),
        );

        let report = mgr.run();

        assert_eq!(report.final_state, CycleState::Done);
        assert_eq!(report.failure, None);
        assert_eq!(
            report.states_visited,
            vec![
                CycleState::Idle,
                CycleState::Scanning,
                CycleState::Centering,
                CycleState::Grasping,
                CycleState::Verifying,
                CycleState::Transporting,
                CycleState::Releasing,
                CycleState::Returning,
                CycleState::Done,
            ]
        );
        assert_eq!(report.grasp_attempts, 1);
        assert_eq!(report.centred_at_px, Some(160));

        let (left_s, right_s) = mgr.odometer().current_estimate();
        assert_eq!(left_s, mgr.odometer().total_rotation_time_s());
        assert_eq!(right_s, 0.0);
        assert_eq!(report.odometer_overruns, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["final_state"], "Done");
        assert_eq!(json["grasp_attempts"], 1);

        // Terminal states are sticky
        assert_eq!(mgr.step(), CycleState::Done);
        assert!(cell.world.borrow().active_cmd().is_none());
    }

    #[test]
    fn test_grasp_that_never_clears_fails() {
        let cell = SimCell::new(SimParams::default());
        let params = scripted_params();
        let ceiling = params.grasp_retry_ceiling;
        let mut mgr = mgr(
            &cell,
            params,
            Box::new(ScriptedDetector::new(vec![Some(160)])),
            Box::new(ImmediateTrigger),
            CancelToken::new(),
        );

        let report = mgr.run();

        assert_eq!(report.final_state, CycleState::Failed);
        assert_eq!(report.failure, Some(FailureCause::GraspRetriesExhausted));
        assert_eq!(report.grasp_attempts, ceiling + 1);
        assert!(!mgr.odometer().is_driving());
        assert!(cell.world.borrow().active_cmd().is_none());
    }

    #[test]
    fn test_object_not_found_after_both_sweeps() {
        let cell = SimCell::new(SimParams::default());
        let mut mgr = mgr(
            &cell,
            scripted_params(),
            Box::new(ScriptedDetector::new(vec![None])),
            Box::new(ImmediateTrigger),
            CancelToken::new(),
        );

        let report = mgr.run();

        assert_eq!(report.failure, Some(FailureCause::ObjectNotFound));
        assert_eq!(
            report.states_visited,
            vec![CycleState::Idle, CycleState::Scanning, CycleState::Failed]
        );

        // One sweep each way
        let world = cell.world.borrow();
        assert_eq!(world.base_drive_count(RotDir::Left.arm_cmd()), 1);
        assert_eq!(world.base_drive_count(RotDir::Right.arm_cmd()), 1);
    }

    #[test]
    fn test_trigger_gates_start_and_rearm() {
        let cell = SimCell::new(SimParams::default());
        let mut polls = 0;
        let trigger = move || {
            polls += 1;
            polls > 2
        };
        let cancel = CancelToken::new();
        let mut mgr = mgr(
            &cell,
            scripted_params(),
            Box::new(ScriptedDetector::new(vec![None])),
            Box::new(trigger),
            cancel.clone(),
        );

        assert_eq!(mgr.step(), CycleState::Idle);
        assert_eq!(mgr.step(), CycleState::Idle);
        assert_eq!(mgr.step(), CycleState::Scanning);

        // Cancel mid-cycle, the cell is left safe in Failed
        cancel.cancel();
        assert_eq!(mgr.step(), CycleState::Failed);
        assert_eq!(mgr.report().failure, Some(FailureCause::Cancelled));
        assert!(cell.world.borrow().active_cmd().is_none());

        assert_eq!(mgr.rearm(), CycleState::Idle);
        assert!(!cancel.is_cancelled());
        assert_eq!(mgr.report().states_visited, vec![CycleState::Idle]);
    }

    #[test]
    fn test_simulated_cycle_with_slipped_grasp() {
        let cell = SimCell::new(SimParams {
            failed_grasps: 1,
            ..SimParams::default()
        });
        let detector = cell.world_detector();
        let mut mgr = mgr(
            &cell,
            PickMgrParams::default(),
            Box::new(detector),
            Box::new(ImmediateTrigger),
            CancelToken::new(),
        );

        let report = mgr.run();

        assert_eq!(report.final_state, CycleState::Done, "{:?}", report);
        assert_eq!(report.grasp_attempts, 2);

        let world = cell.world.borrow();
        assert!(!world.object_held());
        assert!(world.object_base_pos_s() < 0.05);
        assert!((world.base_pos_s() - (16.5 - 0.8)).abs() < 1e-6);
        assert_eq!(mgr.odometer().current_estimate(), (16.5, 0.0));
    }

    #[test]
    fn test_transport_from_far_stop_with_late_sleeps() {
        // Object at the calibration stop, so after centring the base is a full rotation from
        // the drop zone
        let cell = SimCell::new(SimParams {
            object_base_pos_s: 16.5,
            ..SimParams::default()
        });
        let mut params = PickMgrParams::default();
        params.servo_ctrl.target.tolerance_px = 5;
        let margin_s = params.transport_margin_s;
        let return_margin_s = params.grasp_seq.return_margin_s;
        let clock = LateClock {
            inner: cell.clock.clone(),
            late_s: 0.05,
        };

        let mut mgr = PickMgr::new(
            params,
            Box::new(cell.open_arm().unwrap()),
            Box::new(cell.open_camera().unwrap()),
            Box::new(cell.world_detector()),
            Box::new(ImmediateTrigger),
            Rc::new(clock),
            CancelToken::new(),
        )
        .unwrap();

        let report = mgr.run();

        assert_eq!(report.final_state, CycleState::Done, "{:?}", report);
        assert_eq!(report.odometer_overruns, 0);

        // Released short of the drop zone stop by about the margin, then rehomed from there
        let world = cell.world.borrow();
        assert!(!world.object_held());
        assert!(world.object_base_pos_s() >= margin_s - 0.1);
        assert!(world.object_base_pos_s() <= margin_s + 0.1);
        assert!((world.base_pos_s() - (16.5 - return_margin_s)).abs() < 0.1);
        assert_eq!(mgr.odometer().current_estimate(), (16.5, 0.0));
    }
}
