//! # Simulated camera and detectors

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{cell::Cell, rc::Rc};

use comms_if::eqpt::{
    cam::{BoundingBox, CamImage, Camera, Detector},
    EqptError,
};
use image::{DynamicImage, GenericImageView};
use util::time::{Clock, SimClock};

use super::{SharedWorld, SimParams};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Width of the boxes produced by the [`ScriptedDetector`].
///
/// Units: pixels
const SCRIPTED_BOX_WIDTH_PX: i32 = 40;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Camera producing blank frames at a fixed rate.
///
/// Acquiring a frame advances the simulated clock by one frame period.
pub struct SimCamera {
    clock: SimClock,

    frame_period_s: f64,

    width_px: u32,

    height_px: u32,

    frames_left: Option<usize>,
}

/// Detector reporting the object's projection from the simulated world.
pub struct WorldDetector {
    world: SharedWorld,
}

/// Detector which replays a fixed script of horizontal positions, one entry per call.
///
/// Once the script is exhausted the final entry is repeated.
pub struct ScriptedDetector {
    script: Vec<Option<i32>>,

    calls: Rc<Cell<usize>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimCamera {
    pub fn new(clock: SimClock, params: &SimParams) -> Self {
        Self {
            clock,
            frame_period_s: params.frame_period_s,
            width_px: params.frame_width_px,
            height_px: params.frame_height_px,
            frames_left: params.max_frames,
        }
    }
}

impl Camera for SimCamera {
    fn next_frame(&mut self) -> Result<Option<CamImage>, EqptError> {
        if let Some(ref mut left) = self.frames_left {
            if *left == 0 {
                return Ok(None);
            }
            *left -= 1;
        }

        self.clock.advance_s(self.frame_period_s);

        Ok(Some(CamImage {
            timestamp_s: self.clock.now_s(),
            image: DynamicImage::new_luma8(self.width_px, self.height_px),
        }))
    }

    fn drain(&mut self, _num_frames: usize) -> Result<(), EqptError> {
        // Nothing is buffered, every frame is rendered on demand
        Ok(())
    }
}

impl WorldDetector {
    pub fn new(world: SharedWorld) -> Self {
        Self { world }
    }
}

impl Detector for WorldDetector {
    fn detect(&mut self, frame: &CamImage) -> Vec<(BoundingBox, f64)> {
        let world = self.world.borrow();

        match world.object_px() {
            Some(x) => {
                let width = world.object_width_px();
                let height = frame.image.height() as i32 / 4;
                vec![(
                    BoundingBox::new(
                        (x - width as f64 / 2.0).round() as i32,
                        frame.image.height() as i32 / 2 - height / 2,
                        width,
                        height,
                    ),
                    1.0,
                )]
            }
            None => Vec::new(),
        }
    }
}

impl ScriptedDetector {
    pub fn new(script: Vec<Option<i32>>) -> Self {
        Self {
            script,
            calls: Rc::new(Cell::new(0)),
        }
    }

    /// Handle to the number of times the detector has been called.
    pub fn call_counter(&self) -> Rc<Cell<usize>> {
        self.calls.clone()
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &CamImage) -> Vec<(BoundingBox, f64)> {
        let idx = self.calls.get();
        self.calls.set(idx + 1);

        let entry = self
            .script
            .get(idx)
            .or_else(|| self.script.last())
            .copied()
            .flatten();

        match entry {
            Some(x) => vec![(
                BoundingBox::new(
                    x - SCRIPTED_BOX_WIDTH_PX / 2,
                    0,
                    SCRIPTED_BOX_WIDTH_PX,
                    SCRIPTED_BOX_WIDTH_PX,
                ),
                1.0,
            )],
            None => Vec::new(),
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
    fn test_scripted_detector_repeats_last() {
        let mut cam = SimCamera::new(SimClock::new(), &SimParams::default());
        let frame = cam.next_frame().unwrap().unwrap();
        let mut det = ScriptedDetector::new(vec![None, Some(100)]);

        assert!(det.detect(&frame).is_empty());
        for _ in 0..3 {
            let boxes = det.detect(&frame);
            assert_eq!(boxes.len(), 1);
            assert_eq!(boxes[0].0.x_centre(), 100.0);
        }
        assert_eq!(det.call_counter().get(), 4);
    }
}
