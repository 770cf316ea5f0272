//! Cooperative cancellation.
//!
//! A pipeline execution is bounded by a [`Deadline`] when it has a timeout;
//! a consumer's poll loop is cancelled when it is stopped.

mod deadline;
mod token;

pub(crate) use deadline::Deadline;
pub use token::CancellationToken;
