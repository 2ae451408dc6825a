//! Implementations for the base odometer state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use std::rc::Rc;

// Internal
use super::{BaseOdomParams, DriveUpdate, OdometerError, RotDir};
use util::time::Clock;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Dead-reckoned rotation state of the base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotationState {
    /// Time the base would need to drive left to reach the left-hand stop.
    ///
    /// Units: seconds
    pub estimated_left_time_s: f64,

    /// Time the base would need to drive right to reach the right-hand stop.
    ///
    /// Units: seconds
    pub estimated_right_time_s: f64,

    /// Time for a full stop-to-stop rotation.
    ///
    /// Units: seconds
    pub total_rotation_time_s: f64,

    /// Direction of the active drive, or of the last drive if none is active. `None` if the base
    /// has not been driven since calibration.
    pub direction: Option<RotDir>,

    /// Clock time at which the active drive started, `None` when not driving.
    ///
    /// Units: seconds
    pub drive_started_at_s: Option<f64>,

    /// Number of drive updates discarded as overruns.
    pub overrun_count: u32,
}

/// Base odometer.
///
/// Owned by whichever component currently holds the actuator channel.
pub struct BaseOdometer {
    params: BaseOdomParams,

    state: RotationState,

    clock: Rc<dyn Clock>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RotationState {
    /// The calibrated baseline: base at the right-hand stop.
    pub fn calibrated(total_rotation_time_s: f64) -> Self {
        Self {
            estimated_left_time_s: total_rotation_time_s,
            estimated_right_time_s: 0.0,
            total_rotation_time_s,
            direction: None,
            drive_started_at_s: None,
            overrun_count: 0,
        }
    }
}

impl BaseOdometer {
    /// Create a new odometer with the arm assumed to be at the calibration pose.
    pub fn new(params: BaseOdomParams, clock: Rc<dyn Clock>) -> Result<Self, OdometerError> {
        let total = params.total_rotation_time_s;
        if !total.is_finite() || total <= 0.0 {
            return Err(OdometerError::InvalidTotalRotationTime(total));
        }

        let tolerance = params.overrun_tolerance_s;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(OdometerError::InvalidOverrunTolerance(tolerance));
        }

        Ok(Self {
            state: RotationState::calibrated(total),
            params,
            clock,
        })
    }

    /// Mark the start of a base drive in the given direction.
    pub fn start_drive(&mut self, dir: RotDir) -> Result<(), OdometerError> {
        if self.state.drive_started_at_s.is_some() {
            // A drive can only be active with a direction set
            let active = self.state.direction.unwrap_or(dir);
            return Err(OdometerError::AlreadyDriving(dir, active));
        }

        self.state.direction = Some(dir);
        self.state.drive_started_at_s = Some(self.clock.now_s());

        Ok(())
    }

    /// Mark the end of the active drive and integrate its duration into the estimate.
    pub fn stop_drive(&mut self) -> Result<DriveUpdate, OdometerError> {
        let started_at_s = self
            .state
            .drive_started_at_s
            .take()
            .ok_or(OdometerError::NotDriving)?;

        let elapsed_s = self.clock.now_s() - started_at_s;
        let total = self.params.total_rotation_time_s;

        if elapsed_s > total + self.params.overrun_tolerance_s {
            self.state.overrun_count += 1;
            warn!(
                "Base drive lasted {:.3} s, longer than a full rotation ({:.3} s), update \
                 discarded",
                elapsed_s, total
            );
            return Ok(DriveUpdate::Overrun { elapsed_s });
        }

        let left_s = match self.state.direction {
            Some(RotDir::Left) => self.state.estimated_left_time_s - elapsed_s,
            Some(RotDir::Right) => self.state.estimated_left_time_s + elapsed_s,
            None => self.state.estimated_left_time_s,
        };

        self.state.estimated_left_time_s = left_s.max(0.0).min(total);
        self.state.estimated_right_time_s = total - self.state.estimated_left_time_s;

        debug!(
            "Base drive {:?} for {:.3} s, estimate now L {:.3} s / R {:.3} s",
            self.state.direction,
            elapsed_s,
            self.state.estimated_left_time_s,
            self.state.estimated_right_time_s
        );

        Ok(DriveUpdate::Applied { elapsed_s })
    }

    /// Current estimate as `(left_time_s, right_time_s)`.
    pub fn current_estimate(&self) -> (f64, f64) {
        (
            self.state.estimated_left_time_s,
            self.state.estimated_right_time_s,
        )
    }

    /// Estimated drive time left before the base reaches the stop in the given direction.
    pub fn remaining_time_s(&self, dir: RotDir) -> f64 {
        match dir {
            RotDir::Left => self.state.estimated_left_time_s,
            RotDir::Right => self.state.estimated_right_time_s,
        }
    }

    pub fn is_driving(&self) -> bool {
        self.state.drive_started_at_s.is_some()
    }

    /// Direction of the active or most recent drive.
    pub fn last_dir(&self) -> Option<RotDir> {
        self.state.direction
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    pub fn total_rotation_time_s(&self) -> f64 {
        self.params.total_rotation_time_s
    }

    /// Reset the estimate to the calibrated baseline, keeping the overrun count.
    ///
    /// Any active drive is forgotten, so the caller must have stopped the motor.
    pub fn reset_to_calibration(&mut self) {
        let overrun_count = self.state.overrun_count;
        self.state = RotationState::calibrated(self.params.total_rotation_time_s);
        self.state.overrun_count = overrun_count;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::base_odom::ESTIMATE_EPSILON_S;
    use proptest::prelude::*;
    use util::time::SimClock;

    fn odometer(total_s: f64) -> (BaseOdometer, SimClock) {
        let clock = SimClock::new();
        let odom = BaseOdometer::new(
            BaseOdomParams {
                total_rotation_time_s: total_s,
                ..BaseOdomParams::default()
            },
            Rc::new(clock.clone()),
        )
        .unwrap();

        (odom, clock)
    }

    #[test]
    fn test_drive_updates_estimate() {
        let (mut odom, clock) = odometer(16.5);

        assert_eq!(odom.current_estimate(), (16.5, 0.0));

        odom.start_drive(RotDir::Left).unwrap();
        clock.sleep_s(4.0);
        assert_eq!(
            odom.stop_drive().unwrap(),
            DriveUpdate::Applied { elapsed_s: 4.0 }
        );
        assert_eq!(odom.current_estimate(), (12.5, 4.0));

        odom.start_drive(RotDir::Right).unwrap();
        clock.sleep_s(1.5);
        odom.stop_drive().unwrap();
        assert_eq!(odom.current_estimate(), (14.0, 2.5));
        assert_eq!(odom.last_dir(), Some(RotDir::Right));
    }

    #[test]
    fn test_invalid_state() {
        let (mut odom, _clock) = odometer(10.0);

        let e = odom.stop_drive().unwrap_err();
        assert!(e.is_invalid_state());

        odom.start_drive(RotDir::Left).unwrap();
        match odom.start_drive(RotDir::Right) {
            Err(OdometerError::AlreadyDriving(RotDir::Right, RotDir::Left)) => (),
            r => panic!("Expected AlreadyDriving, got {:?}", r),
        }
        assert!(odom.is_driving());

        assert!(BaseOdometer::new(
            BaseOdomParams {
                total_rotation_time_s: 0.0,
                ..BaseOdomParams::default()
            },
            Rc::new(SimClock::new())
        )
        .is_err());

        match BaseOdometer::new(
            BaseOdomParams {
                overrun_tolerance_s: -0.1,
                ..BaseOdomParams::default()
            },
            Rc::new(SimClock::new()),
        ) {
            Err(OdometerError::InvalidOverrunTolerance(_)) => (),
            r => panic!("Expected InvalidOverrunTolerance, got {:?}", r.err()),
        }
    }

    #[test]
    fn test_clamped_at_stops() {
        let (mut odom, clock) = odometer(10.0);

        // Driving right from the right-hand stop leaves the estimate pinned at the stop
        odom.start_drive(RotDir::Right).unwrap();
        clock.sleep_s(3.0);
        odom.stop_drive().unwrap();
        assert_eq!(odom.current_estimate(), (10.0, 0.0));

        odom.start_drive(RotDir::Left).unwrap();
        clock.sleep_s(9.0);
        odom.stop_drive().unwrap();
        odom.start_drive(RotDir::Left).unwrap();
        clock.sleep_s(9.0);
        odom.stop_drive().unwrap();
        assert_eq!(odom.current_estimate(), (0.0, 10.0));
    }

    #[test]
    fn test_overrun_discarded() {
        let (mut odom, clock) = odometer(10.0);

        odom.start_drive(RotDir::Left).unwrap();
        clock.sleep_s(2.0);
        odom.stop_drive().unwrap();

        odom.start_drive(RotDir::Left).unwrap();
        clock.sleep_s(10.5);
        assert_eq!(
            odom.stop_drive().unwrap(),
            DriveUpdate::Overrun { elapsed_s: 10.5 }
        );

        assert_eq!(odom.current_estimate(), (8.0, 2.0));
        assert_eq!(odom.state().overrun_count, 1);
        assert!(!odom.is_driving());

        odom.reset_to_calibration();
        assert_eq!(odom.current_estimate(), (10.0, 0.0));
        assert_eq!(odom.state().overrun_count, 1);
        assert_eq!(odom.last_dir(), None);
    }

    #[test]
    fn test_full_sweep_with_late_stop_applied() {
        let (mut odom, clock) = odometer(10.0);

        // A full sweep stopped a little late, as happens with wall clock sleeps
        odom.start_drive(RotDir::Left).unwrap();
        clock.sleep_s(10.05);
        assert_eq!(
            odom.stop_drive().unwrap(),
            DriveUpdate::Applied { elapsed_s: 10.05 }
        );
        assert_eq!(odom.current_estimate(), (0.0, 10.0));
        assert_eq!(odom.state().overrun_count, 0);
    }

    proptest! {
        #[test]
        fn prop_estimate_sums_to_total(
            total_s in 1.0f64..30.0,
            drives in prop::collection::vec((any::<bool>(), 0.0f64..0.99), 0..50)
        ) {
            let (mut odom, clock) = odometer(total_s);

            for (left, frac) in drives {
                let dir = if left { RotDir::Left } else { RotDir::Right };
                odom.start_drive(dir).unwrap();
                clock.sleep_s(frac * total_s);
                let update = odom.stop_drive().unwrap();
                prop_assert!(matches!(update, DriveUpdate::Applied { .. }), "expected DriveUpdate::Applied, got {:?}", update);

                let (l, r) = odom.current_estimate();
                prop_assert!((l + r - total_s).abs() <= ESTIMATE_EPSILON_S);
                prop_assert!(l >= 0.0 && l <= total_s);
            }
        }
    }
}
