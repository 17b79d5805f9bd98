//! Conversation sessions for Baso.
//!
//! [`SessionController`] drives one conversation through the
//! submit/stream/settle cycle; [`Autocompleter`] is the debounced
//! suggest-while-typing variant.

pub mod autocomplete;
pub mod controller;

#[cfg(test)]
mod testing;

pub use autocomplete::{Autocompleter, apply_suggestion};
pub use controller::{SessionController, SessionState, SubmitOutcome};
