//! # Simulated world state

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use comms_if::eqpt::mech::{ArmCmd, JointId, JOINT_IDS};
use log::{debug, info};
use util::time::{Clock, SimClock};

use super::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Ground truth of the simulated cell.
///
/// Joint positions are accumulated signed drive times, starting from zero at the calibration
/// pose, except for the base which starts at the right-hand stop.
#[derive(Debug)]
pub struct SimWorld {
    clock: SimClock,

    params: SimParams,

    /// Settled joint positions, not including the active command.
    ///
    /// Units: seconds
    joint_pos_s: HashMap<JointId, f64>,

    /// Active command and the time it started.
    active: Option<(ArmCmd, f64)>,

    /// Position of the object when it is not held.
    ///
    /// Units: seconds
    object_base_pos_s: f64,

    object_held: bool,

    failed_grasps_remaining: u32,

    /// Every drive command received, in order.
    pub drive_log: Vec<ArmCmd>,

    /// Number of stop commands received.
    pub stop_count: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimWorld {
    pub fn new(clock: SimClock, params: &SimParams) -> Self {
        let mut joint_pos_s: HashMap<JointId, f64> =
            JOINT_IDS.iter().map(|id| (*id, 0.0)).collect();
        joint_pos_s.insert(JointId::Base, params.total_rotation_time_s);

        Self {
            clock,
            joint_pos_s,
            active: None,
            object_base_pos_s: params.object_base_pos_s,
            object_held: false,
            failed_grasps_remaining: params.failed_grasps,
            drive_log: Vec::new(),
            stop_count: 0,
            params: params.clone(),
        }
    }

    /// Start a new command, settling any currently active one.
    pub fn drive(&mut self, cmd: ArmCmd) {
        self.settle();
        self.drive_log.push(cmd);
        self.active = Some((cmd, self.clock.now_s()));
    }

    /// Stop all motors.
    pub fn stop(&mut self) {
        self.settle();
        self.stop_count += 1;
    }

    /// The command currently being executed, if any.
    pub fn active_cmd(&self) -> Option<ArmCmd> {
        self.active.map(|(cmd, _)| cmd)
    }

    /// Position of a joint at the current time, including any active motion.
    pub fn joint_pos_s(&self, joint: JointId) -> f64 {
        let settled = self.joint_pos_s[&joint];

        match self.active {
            Some((cmd, start_s)) if cmd.joint == joint => {
                self.limit(joint, settled + cmd.dir.sign() * (self.clock.now_s() - start_s))
            }
            _ => settled,
        }
    }

    /// Current base position as drive time from the left-hand stop.
    pub fn base_pos_s(&self) -> f64 {
        self.joint_pos_s(JointId::Base)
    }

    pub fn object_held(&self) -> bool {
        self.object_held
    }

    pub fn object_base_pos_s(&self) -> f64 {
        self.object_base_pos_s
    }

    /// Horizontal pixel position of the object in the current image, or `None` if it cannot be
    /// seen.
    pub fn object_px(&self) -> Option<f64> {
        if self.object_held {
            return None;
        }

        let x = self.params.camera_centre_px
            + (self.object_base_pos_s - self.base_pos_s()) * self.params.px_per_s;

        if x >= 0.0 && x < self.params.frame_width_px as f64 {
            Some(x)
        } else {
            None
        }
    }

    pub fn object_width_px(&self) -> i32 {
        self.params.object_width_px
    }

    /// Number of drive commands issued to the base in the given direction.
    pub fn base_drive_count(&self, cmd: ArmCmd) -> usize {
        self.drive_log.iter().filter(|c| **c == cmd).count()
    }

    /// Fold the active command into the settled joint positions and apply its effect on the
    /// object.
    fn settle(&mut self) {
        let (cmd, start_s) = match self.active.take() {
            Some(a) => a,
            None => return,
        };

        let elapsed_s = self.clock.now_s() - start_s;
        let pos = self.joint_pos_s[&cmd.joint] + cmd.dir.sign() * elapsed_s;
        let pos = self.limit(cmd.joint, pos);
        self.joint_pos_s.insert(cmd.joint, pos);

        if elapsed_s <= 0.0 {
            return;
        }

        if cmd == ArmCmd::GRIP_CLOSE && self.object_in_reach() {
            if self.failed_grasps_remaining > 0 {
                self.failed_grasps_remaining -= 1;
                info!("Sim: grasp slipped");
            } else {
                self.object_held = true;
                info!("Sim: object grasped at base {:.3} s", self.base_pos_s());
            }
        } else if cmd == ArmCmd::GRIP_OPEN && self.object_held {
            self.object_held = false;
            self.object_base_pos_s = self.base_pos_s();
            info!("Sim: object released at base {:.3} s", self.object_base_pos_s);
        }

        debug!("Sim: {} for {:.3} s, now at {:.3} s", cmd, elapsed_s, pos);
    }

    fn object_in_reach(&self) -> bool {
        !self.object_held
            && (self.base_pos_s() - self.object_base_pos_s).abs() <= self.params.grasp_tolerance_s
            && self.joint_pos_s[&JointId::Shoulder] <= -self.params.grasp_min_shoulder_drop_s
    }

    /// The base is the only joint with modelled mechanical stops.
    fn limit(&self, joint: JointId, pos: f64) -> f64 {
        match joint {
            JointId::Base => pos.max(0.0).min(self.params.total_rotation_time_s),
            _ => pos,
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
    fn test_world_motion_and_grasp() {
        let clock = SimClock::new();
        let params = SimParams {
            object_base_pos_s: 14.0,
            ..SimParams::default()
        };
        let mut world = SimWorld::new(clock.clone(), &params);

        // Object 2.5 s to the left of the calibration pose
        assert_eq!(world.object_px(), Some(165.0 - 2.5 * 60.0));

        world.drive(ArmCmd::BASE_LEFT);
        clock.sleep_s(1.0);
        assert_eq!(world.base_pos_s(), 15.5);
        clock.sleep_s(1.5);
        world.stop();
        assert_eq!(world.object_px(), Some(165.0));

        // Closing the grip without lowering the shoulder misses
        world.drive(ArmCmd::GRIP_CLOSE);
        clock.sleep_s(1.0);
        world.stop();
        assert!(!world.object_held());

        world.drive(ArmCmd::SHOULDER_DOWN);
        clock.sleep_s(1.4);
        world.drive(ArmCmd::GRIP_CLOSE);
        clock.sleep_s(1.0);
        world.stop();
        assert!(world.object_held());
        assert_eq!(world.object_px(), None);
        assert_eq!(world.stop_count, 3);
        assert_eq!(world.base_drive_count(ArmCmd::BASE_LEFT), 1);
    }

    #[test]
    fn test_base_stops() {
        let clock = SimClock::new();
        let mut world = SimWorld::new(clock.clone(), &SimParams::default());

        world.drive(ArmCmd::BASE_RIGHT);
        clock.sleep_s(5.0);
        world.stop();

        assert_eq!(world.base_pos_s(), 16.5);
    }
}
