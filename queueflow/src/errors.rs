//! Error types for the queueflow framework.
//!
//! Pipeline failures come through exactly three channels:
//!
//! - [`PipelineError::InvalidTimeout`] is a validation failure reported before
//!   any handler runs.
//! - [`PipelineError::Timeout`] is raised when the wall-clock budget of an
//!   execution elapses.
//! - [`PipelineError::Handler`] carries whatever error value the handler chain
//!   produced, untouched.
//!
//! [`PipelineError::Halted`] covers a chain whose handler gave up its
//! continuation without signalling anything, and [`PipelineError::Aborted`] a
//! timed execution whose task was torn down by the runtime.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// The error currency handlers speak.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result returned by every handler invocation.
pub type HandlerResult = Result<(), BoxError>;

/// The single failure outcome of [`Pipeline::execute`](crate::pipeline::Pipeline::execute).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The timeout argument was rejected before the chain started.
    #[error("Pipeline execution timeout must be greater than 0 (got {timeout_ms})")]
    InvalidTimeout {
        /// The rejected value.
        timeout_ms: u64,
    },

    /// The execution ran past its configured budget.
    #[error(transparent)]
    Timeout(#[from] PipelineTimeoutError),

    /// An error raised by a handler and not recovered by any error handler.
    #[error(transparent)]
    Handler(BoxError),

    /// A handler dropped its continuation without proceeding or failing.
    #[error("Pipeline halted: a handler returned without invoking its continuation")]
    Halted,

    /// The task driving a timed execution was cancelled before it settled.
    #[error("Pipeline execution aborted: {reason}")]
    Aborted {
        /// The runtime's description of the cancellation.
        reason: String,
    },
}

impl PipelineError {
    /// Returns true if this is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns true if this is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidTimeout { .. })
    }

    /// Returns the handler-raised error, if this is one.
    #[must_use]
    pub fn handler_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Downcasts the handler-raised error to a concrete type.
    #[must_use]
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.handler_error().and_then(|err| err.downcast_ref::<E>())
    }

    /// Converts into a value a handler can raise.
    ///
    /// Handler errors come back out unchanged; every other kind is boxed.
    #[must_use]
    pub fn into_handler_error(self) -> BoxError {
        match self {
            Self::Handler(err) => err,
            other => Box::new(other),
        }
    }
}

/// Raised only when an execution's timer fires before settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Pipeline timeout after {timeout_ms} milliseconds")]
pub struct PipelineTimeoutError {
    timeout_ms: u64,
}

impl PipelineTimeoutError {
    /// Creates a timeout error for the given budget.
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    /// The configured budget in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// The configured budget as a duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A panic caught while running a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Handler panicked: {message}")]
pub struct HandlerPanic {
    /// The panic message, when one could be recovered.
    pub message: String,
}

impl HandlerPanic {
    /// Creates a panic error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts the message from a `catch_unwind` payload.
    #[must_use]
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

/// Errors raised by a queue client.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Receiving messages failed.
    #[error("Receive failed for queue {queue_url}: {reason}")]
    Receive {
        /// The queue URL.
        queue_url: String,
        /// The reason for failure.
        reason: String,
    },

    /// Deleting one or more messages failed.
    #[error("Delete failed for queue {queue_url}: {reason}")]
    Delete {
        /// The queue URL.
        queue_url: String,
        /// The reason for failure.
        reason: String,
    },

    /// The queue does not exist.
    #[error("Queue not found: {queue_url}")]
    NotFound {
        /// The queue URL.
        queue_url: String,
    },
}

impl QueueError {
    /// Creates a receive error.
    #[must_use]
    pub fn receive(queue_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Receive {
            queue_url: queue_url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a delete error.
    #[must_use]
    pub fn delete(queue_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delete {
            queue_url: queue_url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(queue_url: impl Into<String>) -> Self {
        Self::NotFound {
            queue_url: queue_url.into(),
        }
    }
}

/// Errors raised while configuring or starting a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    /// The consumer is running and cannot be reconfigured.
    #[error("Cannot {action} while the consumer is running")]
    Running {
        /// What was attempted.
        action: &'static str,
    },

    /// `start` was called before `subscribe`.
    #[error("Consumer has no subscription")]
    NotSubscribed,

    /// The subscription failed validation.
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),
}

impl ConsumerError {
    /// Creates a running error for the given action.
    #[must_use]
    pub fn running(action: &'static str) -> Self {
        Self::Running { action }
    }

    /// Creates an invalid subscription error.
    #[must_use]
    pub fn invalid_subscription(message: impl Into<String>) -> Self {
        Self::InvalidSubscription(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Error, PartialEq)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_timeout_error_exposes_budget() {
        let err = PipelineTimeoutError::new(250);
        assert_eq!(err.timeout_ms(), 250);
        assert_eq!(err.duration(), Duration::from_millis(250));
        assert_eq!(err.to_string(), "Pipeline timeout after 250 milliseconds");
    }

    #[test]
    fn test_pipeline_error_kinds() {
        let timeout = PipelineError::from(PipelineTimeoutError::new(5));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_validation());

        let invalid = PipelineError::InvalidTimeout { timeout_ms: 0 };
        assert!(invalid.is_validation());
        assert!(!invalid.is_timeout());

        let aborted = PipelineError::Aborted {
            reason: "task 7 was cancelled".into(),
        };
        assert!(!aborted.is_timeout());
        assert!(aborted.handler_error().is_none());
        assert_eq!(
            aborted.to_string(),
            "Pipeline execution aborted: task 7 was cancelled"
        );
    }

    #[test]
    fn test_handler_error_is_transparent() {
        let err = PipelineError::Handler(Box::new(Boom));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.downcast_ref::<Boom>(), Some(&Boom));
    }

    #[test]
    fn test_into_handler_error_unwraps_handler_variant() {
        let err = PipelineError::Handler(Box::new(Boom));
        let raised = err.into_handler_error();
        assert!(raised.downcast_ref::<Boom>().is_some());

        let raised = PipelineError::Halted.into_handler_error();
        assert!(raised.downcast_ref::<PipelineError>().is_some());
    }

    #[test]
    fn test_panic_payload_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(HandlerPanic::from_payload(payload.as_ref()).message, "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(HandlerPanic::from_payload(payload.as_ref()).message, "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(
            HandlerPanic::from_payload(payload.as_ref()).message,
            "unknown panic payload"
        );
    }

    #[test]
    fn test_consumer_error_messages() {
        let err = ConsumerError::running("add middlewares");
        assert_eq!(err.to_string(), "Cannot add middlewares while the consumer is running");
        assert_eq!(ConsumerError::NotSubscribed.to_string(), "Consumer has no subscription");
    }
}
