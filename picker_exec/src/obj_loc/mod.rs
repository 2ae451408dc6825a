//! # Object locator
//!
//! Wraps the camera and the external detector, reducing each frame to at most one target
//! position. The detector is noisy: single-frame false positives are common, so a detection is
//! only trusted once it has been seen in several consecutive frames.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::cmp::Ordering;
use std::rc::Rc;

use comms_if::eqpt::{
    cam::{BoundingBox, CamImage, Camera, Detector},
    EqptError,
};
use image::GenericImageView;
use log::{debug, trace};
use serde::Serialize;
use util::time::Clock;

use crate::cancel::CancelToken;

pub use params::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position of the target in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Horizontal centre of the target.
    ///
    /// Units: pixels
    pub x_centre: i32,

    /// Width of the target's bounding box.
    ///
    /// Units: pixels
    pub width: i32,
}

pub struct ObjectLocator {
    params: ObjLocParams,

    camera: Box<dyn Camera>,

    detector: Box<dyn Detector>,

    clock: Rc<dyn Clock>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ObjLocError {
    #[error("The camera stream has ended")]
    StreamEnded,

    #[error("Camera error: {0}")]
    CameraError(EqptError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObjectLocator {
    pub fn new(
        params: ObjLocParams,
        camera: Box<dyn Camera>,
        detector: Box<dyn Detector>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            params,
            camera,
            detector,
            clock,
        }
    }

    /// Locate the target in a single frame.
    pub fn locate(&mut self, frame: &CamImage) -> Option<Detection> {
        let boxes = self.detector.detect(frame);

        if boxes.len() > 1 {
            trace!("{} candidate boxes, selecting {:?}", boxes.len(), self.params.box_select);
        }

        let bbox = select_box(&boxes, self.params.box_select)?;

        // Boxes reaching outside the frame are pinned to its edge
        let x_centre = (bbox.x_centre() * self.params.image_scale)
            .round()
            .max(0.0)
            .min(frame.image.width() as f64);

        Some(Detection {
            x_centre: x_centre as i32,
            width: (bbox.width as f64 * self.params.image_scale).round() as i32,
        })
    }

    /// Acquire the next frame and locate the target in it.
    pub fn poll(&mut self) -> Result<Option<Detection>, ObjLocError> {
        let frame = self
            .camera
            .next_frame()
            .map_err(ObjLocError::CameraError)?
            .ok_or(ObjLocError::StreamEnded)?;

        Ok(self.locate(&frame))
    }

    /// Poll frames until a detection has been confirmed or `window_s` seconds have elapsed.
    ///
    /// At least one frame is always processed. Returns `Ok(None)` on timeout.
    pub fn wait_for_detection(&mut self, window_s: f64) -> Result<Option<Detection>, ObjLocError> {
        self.wait_confirmed(window_s, None)
    }

    /// As [`ObjectLocator::wait_for_detection`], but also gives up and returns `Ok(None)` as
    /// soon as `cancel` is set.
    pub fn wait_for_detection_cancellable(
        &mut self,
        window_s: f64,
        cancel: &CancelToken,
    ) -> Result<Option<Detection>, ObjLocError> {
        self.wait_confirmed(window_s, Some(cancel))
    }

    fn wait_confirmed(
        &mut self,
        window_s: f64,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<Detection>, ObjLocError> {
        let start_s = self.clock.now_s();
        let required = self.params.min_consec_detections.max(1);
        let mut consec = 0;

        loop {
            match self.poll()? {
                Some(det) => {
                    consec += 1;
                    trace!("Detection {}/{} at x = {}", consec, required, det.x_centre);

                    if consec >= required {
                        debug!("Target confirmed at x = {} px", det.x_centre);
                        return Ok(Some(det));
                    }
                }
                None => consec = 0,
            }

            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                debug!("Detection wait cancelled");
                return Ok(None);
            }

            if self.clock.now_s() - start_s >= window_s {
                debug!("No confirmed detection within {:.2} s", window_s);
                return Ok(None);
            }
        }
    }

    /// Discard buffered camera frames.
    pub fn drain(&mut self, num_frames: usize) -> Result<(), ObjLocError> {
        if num_frames == 0 {
            return Ok(());
        }

        self.camera
            .drain(num_frames)
            .map_err(ObjLocError::CameraError)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn select_box(boxes: &[(BoundingBox, f64)], select: BoxSelect) -> Option<BoundingBox> {
    match select {
        BoxSelect::First => boxes.first().map(|(b, _)| *b),
        BoxSelect::Strongest => boxes
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(b, _)| *b),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
