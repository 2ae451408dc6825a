//! # Pick manager parameters
//!
//! Aggregates the parameters of every module so that the whole cell is configured from a single
//! file.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    base_odom::{BaseOdomParams, RotDir},
    grasp_seq::GraspSeqParams,
    obj_loc::ObjLocParams,
    servo_ctrl::ServoCtrlParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PickMgrParams {
    /// Longest time to sweep the base while scanning for the object.
    ///
    /// Units: seconds
    pub full_sweep_time_s: f64,

    /// Direction of the first scanning sweep.
    pub scan_dir: RotDir,

    /// Direction of the drop zone. The object is carried toward the stop on this side.
    pub drop_zone_dir: RotDir,

    /// Transport never drives for longer than a full rotation less this margin, so that a late
    /// stop cannot push the drive past a full rotation and have it discarded by the odometer.
    ///
    /// Units: seconds
    pub transport_margin_s: f64,

    /// How long the object must stay out of sight after a grasp for the grasp to count.
    ///
    /// Units: seconds
    pub verify_window_s: f64,

    /// Number of retries allowed after the first failed grasp. A cycle makes at most
    /// `grasp_retry_ceiling + 1` grasp attempts.
    pub grasp_retry_ceiling: u32,

    /// Period at which the start trigger is polled while idle.
    ///
    /// Units: seconds
    pub trigger_poll_period_s: f64,

    pub base_odom: BaseOdomParams,

    pub obj_loc: ObjLocParams,

    pub servo_ctrl: ServoCtrlParams,

    pub grasp_seq: GraspSeqParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PickMgrParams {
    fn default() -> Self {
        Self {
            full_sweep_time_s: 16.0,
            scan_dir: RotDir::Left,
            drop_zone_dir: RotDir::Left,
            transport_margin_s: 0.5,
            verify_window_s: 2.0,
            grasp_retry_ceiling: 3,
            trigger_poll_period_s: 0.1,
            base_odom: BaseOdomParams::default(),
            obj_loc: ObjLocParams::default(),
            servo_ctrl: ServoCtrlParams::default(),
            grasp_seq: GraspSeqParams::default(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_shipped_params() {
        let params: PickMgrParams = util::params::load_from_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/picker_exec.toml"
        ))
        .unwrap();

        assert_eq!(params.scan_dir, RotDir::Left);
        assert_eq!(params.grasp_retry_ceiling, 3);
        assert_eq!(params.servo_ctrl.target.target_x, 165);
        assert_eq!(params.base_odom.total_rotation_time_s, 16.5);
        assert_eq!(params.base_odom.overrun_tolerance_s, 0.25);
        assert_eq!(params.transport_margin_s, 0.5);
    }

    #[test]
    fn test_partial_params_use_defaults() {
        let params: PickMgrParams = util::params::from_str(
            "grasp_retry_ceiling = 1\n\
             [servo_ctrl.target]\n\
             target_x = 150\n",
        )
        .unwrap();

        assert_eq!(params.grasp_retry_ceiling, 1);
        assert_eq!(params.servo_ctrl.target.target_x, 150);
        assert_eq!(params.servo_ctrl.target.tolerance_px, 2);
        assert_eq!(params.full_sweep_time_s, 16.0);
    }
}
