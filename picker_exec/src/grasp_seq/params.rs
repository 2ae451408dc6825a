//! # Grasp sequencer parameters

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraspSeqParams {
    /// Base rotation time held back when returning to the calibration stop, so the base does not
    /// stall against it.
    ///
    /// Units: seconds
    pub return_margin_s: f64,

    /// Number of stale camera frames discarded during each step's hold.
    pub drain_frames: usize,
}

impl Default for GraspSeqParams {
    fn default() -> Self {
        Self {
            return_margin_s: 0.8,
            drain_frames: 5,
        }
    }
}
