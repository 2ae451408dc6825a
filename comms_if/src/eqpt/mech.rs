//! # Mechanisms Equipment Commands
//!
//! The arm is a five motor, four joint toy-class arm (base, shoulder, elbow, wrist plus the
//! gripper) with no position sensing. Each motor can only be switched on in one of two
//! directions or switched off, and the gateway can express a single active joint command at a
//! time.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// All motors of the arm, base first.
pub const JOINT_IDS: [JointId; 5] = [
    JointId::Base,
    JointId::Shoulder,
    JointId::Elbow,
    JointId::Wrist,
    JointId::Grip,
];

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Serialized channel to the arm's motors.
///
/// Only one joint may be driven at once. Calling [`ActuatorGateway::drive`] replaces any joint
/// command which is currently active.
pub trait ActuatorGateway {
    /// Switch on the motor of `joint` in the given direction.
    fn drive(&mut self, joint: JointId, dir: JointDir) -> Result<(), EqptError>;

    /// Switch off every motor.
    fn stop(&mut self) -> Result<(), EqptError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single joint command, the unit of motion the gateway accepts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmCmd {
    pub joint: JointId,
    pub dir: JointDir,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// IDs of all actuators on the arm
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum JointId {
    Base,
    Shoulder,
    Elbow,
    Wrist,
    Grip,
}

/// Direction a motor is driven in.
///
/// `Forward` is right for the base, up for shoulder, elbow and wrist, and close for the grip.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum JointDir {
    Forward,
    Reverse,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmCmd {
    pub const BASE_RIGHT: ArmCmd = ArmCmd::new(JointId::Base, JointDir::Forward);
    pub const BASE_LEFT: ArmCmd = ArmCmd::new(JointId::Base, JointDir::Reverse);
    pub const SHOULDER_UP: ArmCmd = ArmCmd::new(JointId::Shoulder, JointDir::Forward);
    pub const SHOULDER_DOWN: ArmCmd = ArmCmd::new(JointId::Shoulder, JointDir::Reverse);
    pub const ELBOW_UP: ArmCmd = ArmCmd::new(JointId::Elbow, JointDir::Forward);
    pub const ELBOW_DOWN: ArmCmd = ArmCmd::new(JointId::Elbow, JointDir::Reverse);
    pub const WRIST_UP: ArmCmd = ArmCmd::new(JointId::Wrist, JointDir::Forward);
    pub const WRIST_DOWN: ArmCmd = ArmCmd::new(JointId::Wrist, JointDir::Reverse);
    pub const GRIP_CLOSE: ArmCmd = ArmCmd::new(JointId::Grip, JointDir::Forward);
    pub const GRIP_OPEN: ArmCmd = ArmCmd::new(JointId::Grip, JointDir::Reverse);

    pub const fn new(joint: JointId, dir: JointDir) -> Self {
        Self { joint, dir }
    }

    /// Send this command through the given gateway.
    pub fn send(&self, gateway: &mut dyn ActuatorGateway) -> Result<(), EqptError> {
        gateway.drive(self.joint, self.dir)
    }
}

impl JointDir {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            JointDir::Forward => JointDir::Reverse,
            JointDir::Reverse => JointDir::Forward,
        }
    }

    /// `+1.0` for forward, `-1.0` for reverse.
    pub fn sign(self) -> f64 {
        match self {
            JointDir::Forward => 1.0,
            JointDir::Reverse => -1.0,
        }
    }
}

impl fmt::Display for ArmCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match (self.joint, self.dir) {
            (JointId::Base, JointDir::Forward) => "right",
            (JointId::Base, JointDir::Reverse) => "left",
            (JointId::Grip, JointDir::Forward) => "close",
            (JointId::Grip, JointDir::Reverse) => "open",
            (_, JointDir::Forward) => "up",
            (_, JointDir::Reverse) => "down",
        };

        write!(f, "{:?} {}", self.joint, dir)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_arm_cmd_display() {
        assert_eq!(ArmCmd::BASE_LEFT.to_string(), "Base left");
        assert_eq!(ArmCmd::GRIP_OPEN.to_string(), "Grip open");
        assert_eq!(ArmCmd::WRIST_UP.to_string(), "Wrist up");
        assert_eq!(JointDir::Forward.reversed(), JointDir::Reverse);
        assert_eq!(JointDir::Reverse.sign(), -1.0);
    }
}
