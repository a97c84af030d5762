//! Test-taking session: the controller state machine, its collaborators and
//! the async runtime that drives them.

pub mod answer_store;
pub mod controller;
pub mod countdown;
pub mod navigation;
pub mod platform;
pub mod runtime;
pub mod time_tracker;
pub mod violation;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::{SessionController, SessionPhase, SubmitOutcome, SubmitReason};
pub use platform::{HeadlessPlatform, Platform, PlatformEvent};
pub use runtime::{SessionCommand, SessionEvent, SessionOutcome, SessionRuntime};
