//! # Camera Equipment Communications Module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of camera frames.
pub trait Camera {
    /// Acquire the next frame, blocking until one is available or the device times out.
    ///
    /// Returns `Ok(None)` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<CamImage>, EqptError>;

    /// Discard up to `num_frames` buffered frames so that the next acquired frame is fresh.
    fn drain(&mut self, num_frames: usize) -> Result<(), EqptError>;
}

/// An object detector.
///
/// Implementations return every candidate found in the frame together with a confidence value,
/// in the order the underlying algorithm produced them. Boxes may be expressed in the detector's
/// own (possibly downscaled) pixel space.
pub trait Detector {
    fn detect(&mut self, frame: &CamImage) -> Vec<(BoundingBox, f64)>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A frame acquired from the camera.
#[derive(Clone)]
pub struct CamImage {
    /// Time at which the frame was acquired, in seconds on the control clock.
    pub timestamp_s: f64,

    /// The image itself
    pub image: DynamicImage,
}

/// Axis aligned bounding box around a detected object.
///
/// Units: pixels, origin at the top left of the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Horizontal centre of the box.
    pub fn x_centre(&self) -> f64 {
        self.x as f64 + self.width as f64 / 2.0
    }
}

impl std::fmt::Debug for CamImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use image::GenericImageView;

        f.debug_struct("CamImage")
            .field("timestamp_s", &self.timestamp_s)
            .field("dimensions", &self.image.dimensions())
            .finish()
    }
}
