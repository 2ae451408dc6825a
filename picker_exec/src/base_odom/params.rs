//! Parameters structure for the base odometer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the base odometer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BaseOdomParams {
    /// Time taken for the base to rotate from one mechanical stop to the other.
    ///
    /// Units: seconds
    pub total_rotation_time_s: f64,

    /// How far a drive may exceed `total_rotation_time_s` before it is discarded as an overrun.
    /// Covers sleep overshoot and command latency on the wall clock.
    ///
    /// Units: seconds
    pub overrun_tolerance_s: f64,
}

impl Default for BaseOdomParams {
    fn default() -> Self {
        Self {
            total_rotation_time_s: 16.5,
            overrun_tolerance_s: 0.25,
        }
    }
}
