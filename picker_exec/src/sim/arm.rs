//! # Simulated actuator gateway

use comms_if::eqpt::{
    mech::{ActuatorGateway, ArmCmd, JointDir, JointId},
    EqptError,
};

use super::SharedWorld;

/// Actuator gateway which drives the simulated world.
pub struct SimArm {
    world: SharedWorld,
}

impl SimArm {
    pub fn new(world: SharedWorld) -> Self {
        Self { world }
    }
}

impl ActuatorGateway for SimArm {
    fn drive(&mut self, joint: JointId, dir: JointDir) -> Result<(), EqptError> {
        self.world.borrow_mut().drive(ArmCmd::new(joint, dir));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EqptError> {
        self.world.borrow_mut().stop();
        Ok(())
    }
}
