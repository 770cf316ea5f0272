//! Consumer event definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Something that happened while consuming a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumerEvent {
    /// The poll loop started.
    Started {
        /// The subscribed queue.
        queue_url: String,
        /// When it started.
        at: DateTime<Utc>,
    },
    /// The poll loop stopped.
    Stopped {
        /// The subscribed queue.
        queue_url: String,
        /// When it stopped.
        at: DateTime<Utc>,
    },
    /// A message's pipeline succeeded.
    MessageProcessed {
        /// The message ID.
        message_id: String,
    },
    /// A message's pipeline failed; the message was left on the queue.
    MessageFailed {
        /// The message ID.
        message_id: String,
        /// The failure, rendered.
        error: String,
        /// Whether the failure was a pipeline timeout.
        timed_out: bool,
    },
    /// A message was deleted from the queue.
    MessageDeleted {
        /// The message ID.
        message_id: String,
    },
    /// Every message of a batch succeeded and the batch was deleted.
    BatchProcessed {
        /// Number of messages in the batch.
        size: usize,
    },
    /// At least one message of a batch failed; nothing was deleted.
    BatchFailed {
        /// Number of messages in the batch.
        size: usize,
        /// Number of failed messages.
        failed: usize,
    },
    /// Receiving from the queue failed.
    ReceiveFailed {
        /// The failure, rendered.
        error: String,
    },
    /// Deleting from the queue failed.
    DeleteFailed {
        /// The failure, rendered.
        error: String,
    },
}

impl ConsumerEvent {
    /// Creates a started event stamped now.
    #[must_use]
    pub fn started(queue_url: impl Into<String>) -> Self {
        Self::Started {
            queue_url: queue_url.into(),
            at: Utc::now(),
        }
    }

    /// Creates a stopped event stamped now.
    #[must_use]
    pub fn stopped(queue_url: impl Into<String>) -> Self {
        Self::Stopped {
            queue_url: queue_url.into(),
            at: Utc::now(),
        }
    }

    /// Dotted event type, e.g. `message.failed`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "consumer.started",
            Self::Stopped { .. } => "consumer.stopped",
            Self::MessageProcessed { .. } => "message.processed",
            Self::MessageFailed { .. } => "message.failed",
            Self::MessageDeleted { .. } => "message.deleted",
            Self::BatchProcessed { .. } => "batch.processed",
            Self::BatchFailed { .. } => "batch.failed",
            Self::ReceiveFailed { .. } => "receive.failed",
            Self::DeleteFailed { .. } => "delete.failed",
        }
    }

    /// The level a logging sink reports this event at.
    ///
    /// Timeouts are warnings; other failures are errors.
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Started { .. } | Self::Stopped { .. } => Level::INFO,
            Self::MessageProcessed { .. }
            | Self::MessageDeleted { .. }
            | Self::BatchProcessed { .. } => Level::DEBUG,
            Self::MessageFailed { timed_out: true, .. } => Level::WARN,
            Self::MessageFailed { .. }
            | Self::BatchFailed { .. }
            | Self::ReceiveFailed { .. }
            | Self::DeleteFailed { .. } => Level::ERROR,
        }
    }

    /// Returns true for failure events.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::MessageFailed { .. }
                | Self::BatchFailed { .. }
                | Self::ReceiveFailed { .. }
                | Self::DeleteFailed { .. }
        )
    }

    /// Serializes the event to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::json!({ "type": self.event_type() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_types() {
        assert_eq!(ConsumerEvent::started("q").event_type(), "consumer.started");
        assert_eq!(
            ConsumerEvent::MessageFailed {
                message_id: "1".into(),
                error: "boom".into(),
                timed_out: false,
            }
            .event_type(),
            "message.failed"
        );
    }

    #[test]
    fn test_timeouts_are_warnings() {
        let timed_out = ConsumerEvent::MessageFailed {
            message_id: "1".into(),
            error: "Pipeline timeout after 10 milliseconds".into(),
            timed_out: true,
        };
        let failed = ConsumerEvent::MessageFailed {
            message_id: "1".into(),
            error: "boom".into(),
            timed_out: false,
        };

        assert_eq!(timed_out.level(), Level::WARN);
        assert_eq!(failed.level(), Level::ERROR);
        assert!(failed.is_failure());
        assert!(!ConsumerEvent::BatchProcessed { size: 2 }.is_failure());
    }

    #[test]
    fn test_to_json_is_tagged() {
        let json = ConsumerEvent::BatchFailed { size: 3, failed: 1 }.to_json();
        assert_eq!(json, serde_json::json!({ "type": "batch_failed", "size": 3, "failed": 1 }));
    }
}
