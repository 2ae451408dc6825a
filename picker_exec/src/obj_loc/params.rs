//! # Object locator parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjLocParams {
    /// How to choose one box when the detector returns several.
    pub box_select: BoxSelect,

    /// Scale from detector pixels to frame pixels. Detectors are usually run on a downscaled
    /// image for speed.
    pub image_scale: f64,

    /// Number of consecutive frames with a detection needed before a detection is trusted.
    pub min_consec_detections: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum BoxSelect {
    /// Take the first box reported by the detector.
    First,

    /// Take the box with the highest confidence.
    Strongest,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ObjLocParams {
    fn default() -> Self {
        Self {
            box_select: BoxSelect::First,
            image_scale: 1.0,
            min_consec_detections: 3,
        }
    }
}
