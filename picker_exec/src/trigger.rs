//! # Start triggers
//!
//! A trigger gates the transition out of `Idle`. On the real cell this is a GPIO button; here
//! only the interface is defined, with an always-on trigger for unattended runs.

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Trigger {
    /// Sample the trigger, returning `true` if a run should start.
    fn poll_boolean(&mut self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Trigger that always reads `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTrigger;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Trigger for ImmediateTrigger {
    fn poll_boolean(&mut self) -> bool {
        true
    }
}

impl<F> Trigger for F
where
    F: FnMut() -> bool,
{
    fn poll_boolean(&mut self) -> bool {
        self()
    }
}
