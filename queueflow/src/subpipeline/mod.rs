//! Conditional sub-pipelines.
//!
//! [`when`] wraps a predicate and a handler list into a single normal-path
//! handler. When the predicate accepts the context, the handlers run as an
//! independent nested pipeline against the same context before the outer
//! chain resumes.

mod attributes;
mod matcher;
mod predicate;

pub use attributes::{AttributeFilter, AttributeRule, MessageAttributes};
pub use matcher::{when, When};
pub use predicate::Predicate;
