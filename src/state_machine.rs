//! Pass state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The runtime executes the returned effects and feeds their outcomes back
//! in as events.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{PassError, PassEvent, FAILURE_MARKER};
pub use state::PassState;
pub use transition::{transition, TransitionError};
