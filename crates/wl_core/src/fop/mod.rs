//! Field of play: one lifting platform.
//!
//! [`FieldOfPlay`] is the synchronous state machine; [`FopHandle`] runs it as
//! an actor with a serialized command queue, a ticker and an event broadcast.

mod actor;
mod command;
mod event;
mod field_of_play;
mod state;

#[cfg(test)]
mod proptest_gen;

pub use actor::{FopHandle, Origin, PublishedEvent};
pub use command::FopCommand;
pub use event::{CurrentAttempt, FopEvent, FopSnapshot};
pub use field_of_play::{FieldOfPlay, Rejection};
pub use state::{BreakType, CeremonyType, FopState, FopStateValidator};
