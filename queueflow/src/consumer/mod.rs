//! A polling queue consumer built on [`Pipeline`](crate::pipeline::Pipeline).
//!
//! This module provides:
//! - Queue messages and the [`QueueClient`] abstraction
//! - Subscription configuration with validation
//! - The [`Consumer`] poll loop: execute per message or per batch, delete on
//!   success, log and skip on failure

mod message;
mod queue;
mod runner;
mod scheduler;
mod subscription;

pub use message::{DeleteEntry, Message};
pub use queue::{InMemoryQueue, QueueClient, ReceiveRequest};
pub use runner::{Consumer, ConsumerHandle, ContextFactory, PollSummary};
pub use scheduler::{Scheduler, TokioScheduler};
pub use subscription::{Subscription, DEFAULT_BATCH_SIZE, DEFAULT_WAIT_TIME_SECONDS, MAX_BATCH_SIZE};

#[cfg(test)]
pub(crate) use queue::MockQueueClient;
