//! Subscription configuration.

use super::queue::ReceiveRequest;
use crate::errors::ConsumerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of messages received per poll.
pub const DEFAULT_BATCH_SIZE: u32 = 1;

/// Default long-poll wait, visibility timeout and poll interval in seconds.
pub const DEFAULT_WAIT_TIME_SECONDS: u64 = 10;

/// Largest batch a single receive may return.
pub const MAX_BATCH_SIZE: u32 = 10;

/// What the consumer polls and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// The queue to poll.
    pub queue_url: String,
    /// Messages per poll, between 1 and [`MAX_BATCH_SIZE`].
    ///
    /// Above 1, the batch runs concurrently and is deleted as a whole.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Long-poll wait in seconds, also used as visibility timeout and as the
    /// pause between polls.
    #[serde(default = "default_wait_time")]
    pub wait_time_seconds: u64,
    /// Message attribute names to request.
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Per-message pipeline timeout in milliseconds.
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_wait_time() -> u64 {
    DEFAULT_WAIT_TIME_SECONDS
}

impl Subscription {
    /// Creates a subscription with defaults.
    #[must_use]
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            batch_size: default_batch_size(),
            wait_time_seconds: default_wait_time(),
            attributes: Vec::new(),
            execution_timeout_ms: None,
        }
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the wait time.
    #[must_use]
    pub fn with_wait_time(mut self, seconds: u64) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    /// Sets the requested attribute names.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-message pipeline timeout.
    #[must_use]
    pub fn with_execution_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.execution_timeout_ms = Some(timeout_ms);
        self
    }

    /// Checks the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::InvalidSubscription`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ConsumerError> {
        if self.queue_url.trim().is_empty() {
            return Err(ConsumerError::invalid_subscription("Queue URL must not be empty"));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ConsumerError::invalid_subscription(format!(
                "Batch size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.attributes.iter().any(|a| a.trim().is_empty()) {
            return Err(ConsumerError::invalid_subscription(
                "Attribute names must not be empty",
            ));
        }
        if self.execution_timeout_ms == Some(0) {
            return Err(ConsumerError::invalid_subscription(
                "Execution timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Returns true if messages are processed as a batch.
    #[must_use]
    pub fn is_batched(&self) -> bool {
        self.batch_size > 1
    }

    /// The pause between polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.wait_time_seconds)
    }

    /// Builds the receive call for one poll.
    #[must_use]
    pub fn to_receive_request(&self) -> ReceiveRequest {
        ReceiveRequest {
            queue_url: self.queue_url.clone(),
            max_messages: self.batch_size,
            wait_time_seconds: self.wait_time_seconds,
            visibility_timeout_seconds: self.wait_time_seconds,
            attribute_names: self.attributes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let subscription = Subscription::new("memory://q");
        assert_eq!(subscription.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(subscription.wait_time_seconds, DEFAULT_WAIT_TIME_SECONDS);
        assert!(subscription.attributes.is_empty());
        assert!(subscription.validate().is_ok());
        assert!(!subscription.is_batched());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let subscription: Subscription =
            serde_json::from_str(r#"{"queue_url": "memory://q", "batch_size": 5}"#)
                .expect("valid config");
        assert_eq!(subscription.batch_size, 5);
        assert_eq!(subscription.wait_time_seconds, DEFAULT_WAIT_TIME_SECONDS);
        assert_eq!(subscription.execution_timeout_ms, None);
        assert!(subscription.is_batched());
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(Subscription::new("q").with_batch_size(0).validate().is_err());
        assert!(Subscription::new("q").with_batch_size(1).validate().is_ok());
        assert!(Subscription::new("q").with_batch_size(10).validate().is_ok());
        let err = Subscription::new("q").with_batch_size(11).validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid subscription: Batch size must be between 1 and 10");
    }

    #[test]
    fn test_other_validation() {
        assert!(Subscription::new("  ").validate().is_err());
        assert!(Subscription::new("q").with_attributes(["type", ""]).validate().is_err());
        assert!(Subscription::new("q").with_execution_timeout_ms(0).validate().is_err());
        assert!(Subscription::new("q").with_execution_timeout_ms(500).validate().is_ok());
    }

    #[test]
    fn test_to_receive_request() {
        let request = Subscription::new("memory://q")
            .with_batch_size(4)
            .with_wait_time(3)
            .with_attributes(["type"])
            .to_receive_request();

        assert_eq!(
            request,
            ReceiveRequest {
                queue_url: "memory://q".into(),
                max_messages: 4,
                wait_time_seconds: 3,
                visibility_timeout_seconds: 3,
                attribute_names: vec!["type".into()],
            }
        );
    }
}
