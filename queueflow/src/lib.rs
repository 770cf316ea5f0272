//! # Queueflow
//!
//! Async middleware pipelines for message processing.
//!
//! Queueflow runs an ordered chain of handlers against a shared context with
//! support for:
//!
//! - **Two handler stacks**: normal handlers, and error handlers that only run
//!   once an error was signalled
//! - **Explicit continuations**: every handler advances the chain through its
//!   [`Next`](middleware::Next), possibly from another task
//! - **Timeouts**: a per-execution budget reported as a distinct error
//! - **Sub-pipelines**: predicate- or attribute-gated nested chains
//! - **Queue consumption**: a polling consumer that deletes a message only
//!   after its pipeline succeeded
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use queueflow::prelude::*;
//!
//! let mut consumer = Consumer::new(InMemoryQueue::new());
//! consumer.use_handler(Handler::from_fn(|msg: Arc<Message>, next| async move {
//!     println!("{}", msg.body);
//!     next.proceed();
//!     Ok(())
//! }))?;
//! consumer.subscribe(Subscription::new("memory://orders"))?;
//! let handle = consumer.start()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod consumer;
pub mod errors;
pub mod events;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod subpipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::consumer::{
        Consumer, ConsumerHandle, InMemoryQueue, Message, PollSummary, QueueClient,
        Subscription,
    };
    pub use crate::errors::{
        BoxError, ConsumerError, HandlerResult, PipelineError, PipelineTimeoutError,
        QueueError,
    };
    pub use crate::events::{ConsumerEvent, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::middleware::{ErrorMiddleware, Handler, Middleware, Next};
    pub use crate::pipeline::Pipeline;
    pub use crate::subpipeline::{when, AttributeFilter, Predicate};
}
