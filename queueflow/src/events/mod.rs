//! Consumer events and the sinks that receive them.
//!
//! The consumer never logs through a global: every lifecycle and failure
//! event goes to the [`EventSink`] it was built with. [`LoggingEventSink`]
//! forwards events to `tracing`.

mod event;
mod sink;

pub use event::ConsumerEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
