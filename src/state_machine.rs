//! Scripted intake dialogue as a pure state machine
//!
//! Implements the Elm Architecture pattern: `transition` maps the current
//! state and an event to a new state plus effects, and never performs I/O.

mod effect;
pub mod event;
pub mod script;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Sender};
pub use event::Event;
pub use state::{ChatState, DialogueContext, InputMode, LeadIntake, Stage, Submission};
pub use transition::{transition, TransitionError, TransitionResult};
