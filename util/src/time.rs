//! General time utility functions and the control clock abstraction
//!
//! All control code measures time through a [`Clock`] so that the same logic runs against the
//! wall clock on the real cell and against a [`SimClock`] in simulation and tests. Times are
//! expressed as `f64` seconds since the clock's own epoch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono;
use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of time for the control loop.
pub trait Clock {
    /// Seconds elapsed since the clock's epoch.
    fn now_s(&self) -> f64;

    /// Block the control thread for the given number of seconds.
    ///
    /// Negative or non-finite durations are treated as zero.
    fn sleep_s(&self, duration_s: f64);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SysClock {
    epoch: Instant,
}

/// Simulated clock which only advances when slept on or explicitly advanced.
///
/// Clones share the same underlying time, so a simulated camera and the controller see a single
/// consistent timeline.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_s: Rc<Cell<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SysClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SysClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SysClock {
    fn now_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn sleep_s(&self, duration_s: f64) {
        if duration_s.is_finite() && duration_s > 0.0 {
            thread::sleep(Duration::from_secs_f64(duration_s));
        }
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move simulated time forward without going through [`Clock::sleep_s`].
    pub fn advance_s(&self, duration_s: f64) {
        if duration_s.is_finite() && duration_s > 0.0 {
            self.now_s.set(self.now_s.get() + duration_s);
        }
    }
}

impl Clock for SimClock {
    fn now_s(&self) -> f64 {
        self.now_s.get()
    }

    fn sleep_s(&self, duration_s: f64) {
        self.advance_s(duration_s)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
