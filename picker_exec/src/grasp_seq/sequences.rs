//! # Authored joint sequences
//!
//! Timings were tuned by hand on the real arm for an object at a fixed reach from the base. Motor
//! speed differs with load and direction, so [`UNDO_PICK_UP`] is authored separately rather than
//! derived from [`PICK_UP`].

use comms_if::eqpt::mech::ArmCmd;

use super::{GraspStep, Sequence};

/// Reach down over the centred object and lift it.
pub const PICK_UP: Sequence = Sequence {
    name: "PICK_UP",
    steps: &[
        GraspStep::new(ArmCmd::ELBOW_DOWN, 4.0),
        GraspStep::new(ArmCmd::WRIST_UP, 3.25),
        GraspStep::new(ArmCmd::GRIP_OPEN, 1.8),
        GraspStep::new(ArmCmd::SHOULDER_DOWN, 1.4),
        GraspStep::new(ArmCmd::GRIP_CLOSE, 1.3),
        GraspStep::new(ArmCmd::ELBOW_UP, 4.7),
    ],
    rehome_base: false,
};

/// Put the arm back to where it was before [`PICK_UP`], after a grasp which missed.
pub const UNDO_PICK_UP: Sequence = Sequence {
    name: "UNDO_PICK_UP",
    steps: &[
        GraspStep::new(ArmCmd::GRIP_OPEN, 1.3),
        GraspStep::new(ArmCmd::ELBOW_DOWN, 4.7),
        GraspStep::new(ArmCmd::SHOULDER_UP, 1.4),
        GraspStep::new(ArmCmd::GRIP_CLOSE, 1.8),
        GraspStep::new(ArmCmd::ELBOW_UP, 4.0),
        GraspStep::new(ArmCmd::WRIST_DOWN, 3.25),
    ],
    rehome_base: false,
};

/// Lower the held object onto the drop zone and let go.
pub const PUT_DOWN: Sequence = Sequence {
    name: "PUT_DOWN",
    steps: &[
        GraspStep::new(ArmCmd::ELBOW_DOWN, 3.5),
        GraspStep::new(ArmCmd::GRIP_OPEN, 1.3),
    ],
    rehome_base: false,
};

/// Fold the arm up after [`PUT_DOWN`] and rotate the base back to the calibration stop.
pub const RETURN_TO_CALIBRATION: Sequence = Sequence {
    name: "RETURN_TO_CALIBRATION",
    steps: &[
        GraspStep::new(ArmCmd::SHOULDER_UP, 1.8),
        GraspStep::new(ArmCmd::ELBOW_UP, 4.35),
        GraspStep::new(ArmCmd::GRIP_CLOSE, 1.75),
        GraspStep::new(ArmCmd::WRIST_DOWN, 3.1),
    ],
    rehome_base: true,
};
