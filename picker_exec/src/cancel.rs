//! # Cancellation token
//!
//! The control loop has a single thread. Cancellation is requested from elsewhere (the Ctrl-C
//! handler or a test harness) by setting a shared flag, which the servo loop and the grasp
//! sequencer check between every step.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use util::time::Clock;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest single sleep taken by [`CancelToken::sleep_s`] before checking the flag again.
///
/// Units: seconds
pub const CANCEL_CHECK_PERIOD_S: f64 = 0.1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Shared cancellation flag. Clones refer to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation, used when re-arming the cell for a new run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst)
    }

    /// Sleep on `clock` for `duration_s`, waking periodically to check the flag.
    ///
    /// Returns `false` if the sleep was cut short by a cancellation.
    pub fn sleep_s(&self, clock: &dyn Clock, duration_s: f64) -> bool {
        let end_s = clock.now_s() + duration_s.max(0.0);

        loop {
            if self.is_cancelled() {
                return false;
            }

            let remaining_s = end_s - clock.now_s();
            if remaining_s <= 0.0 {
                return true;
            }

            clock.sleep_s(remaining_s.min(CANCEL_CHECK_PERIOD_S));
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use util::time::SimClock;

    #[test]
    fn test_cancel_shared_between_clones() {
        let token = CancelToken::new();
        let handler_copy = token.clone();

        assert!(!token.is_cancelled());

        std::thread::spawn(move || handler_copy.cancel())
            .join()
            .unwrap();

        assert!(token.is_cancelled());

        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellable_sleep() {
        let clock = SimClock::new();
        let token = CancelToken::new();

        assert!(token.sleep_s(&clock, 1.25));
        assert!((clock.now_s() - 1.25).abs() < 1e-9);

        token.cancel();
        assert!(!token.sleep_s(&clock, 1.0));
        assert!((clock.now_s() - 1.25).abs() < 1e-9);
    }
}
