//! Queue client abstraction and an in-memory implementation.

use super::message::{DeleteEntry, Message};
use crate::errors::QueueError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Parameters of one receive call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRequest {
    /// The queue to receive from.
    pub queue_url: String,
    /// Upper bound on returned messages.
    pub max_messages: u32,
    /// Long-poll wait in seconds.
    pub wait_time_seconds: u64,
    /// How long received messages stay invisible, in seconds.
    pub visibility_timeout_seconds: u64,
    /// Attribute names to return with each message.
    pub attribute_names: Vec<String>,
}

/// A message queue the consumer can poll.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receives up to `request.max_messages` messages.
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<Message>, QueueError>;

    /// Deletes one delivery.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;

    /// Deletes several deliveries at once.
    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: &[DeleteEntry],
    ) -> Result<(), QueueError>;
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Message>,
    in_flight: HashMap<String, Message>,
    deleted: Vec<String>,
}

/// A process-local queue.
///
/// Received messages stay in flight until deleted or released; visibility
/// timeouts are not simulated.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl InMemoryQueue {
    /// Creates an empty queue set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue if it does not exist yet.
    pub fn create_queue(&self, queue_url: impl Into<String>) {
        self.queues.lock().entry(queue_url.into()).or_default();
    }

    /// Enqueues a message body and returns its ID.
    pub fn send(&self, queue_url: &str, body: impl Into<String>) -> String {
        self.send_with_attributes(queue_url, body, HashMap::new())
    }

    /// Enqueues a message with attributes and returns its ID.
    pub fn send_with_attributes(
        &self,
        queue_url: &str,
        body: impl Into<String>,
        attributes: HashMap<String, String>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let message = Message {
            id: id.clone(),
            receipt_handle: String::new(),
            body: body.into(),
            attributes,
        };
        self.queues
            .lock()
            .entry(queue_url.to_string())
            .or_default()
            .ready
            .push_back(message);
        id
    }

    /// Number of messages waiting to be received.
    #[must_use]
    pub fn ready_count(&self, queue_url: &str) -> usize {
        self.queues.lock().get(queue_url).map_or(0, |q| q.ready.len())
    }

    /// Number of received but undeleted messages.
    #[must_use]
    pub fn in_flight_count(&self, queue_url: &str) -> usize {
        self.queues.lock().get(queue_url).map_or(0, |q| q.in_flight.len())
    }

    /// IDs of deleted messages, in deletion order.
    #[must_use]
    pub fn deleted_ids(&self, queue_url: &str) -> Vec<String> {
        self.queues
            .lock()
            .get(queue_url)
            .map(|q| q.deleted.clone())
            .unwrap_or_default()
    }

    /// Makes every in-flight message receivable again.
    pub fn release_in_flight(&self, queue_url: &str) {
        if let Some(queue) = self.queues.lock().get_mut(queue_url) {
            let released: Vec<_> = queue.in_flight.drain().map(|(_, m)| m).collect();
            queue.ready.extend(released);
        }
    }

    fn delete_locked(
        state: &mut QueueState,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), QueueError> {
        let message = state
            .in_flight
            .remove(receipt_handle)
            .ok_or_else(|| {
                QueueError::delete(queue_url, format!("unknown receipt handle {receipt_handle}"))
            })?;
        state.deleted.push(message.id);
        Ok(())
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<Message>, QueueError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(&request.queue_url)
            .ok_or_else(|| QueueError::not_found(&request.queue_url))?;

        let take = queue.ready.len().min(request.max_messages as usize);
        let mut received = Vec::with_capacity(take);
        for mut message in queue.ready.drain(..take).collect::<Vec<_>>() {
            message.receipt_handle = Uuid::new_v4().to_string();
            if !request.attribute_names.iter().any(|n| n == "All") {
                message
                    .attributes
                    .retain(|k, _| request.attribute_names.contains(k));
            }
            queue.in_flight.insert(message.receipt_handle.clone(), message.clone());
            received.push(message);
        }
        Ok(received)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueError::not_found(queue_url))?;
        Self::delete_locked(queue, queue_url, receipt_handle)
    }

    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: &[DeleteEntry],
    ) -> Result<(), QueueError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueError::not_found(queue_url))?;
        if let Some(unknown) = entries
            .iter()
            .find(|e| !queue.in_flight.contains_key(&e.receipt_handle))
        {
            return Err(QueueError::delete(
                queue_url,
                format!("unknown receipt handle {}", unknown.receipt_handle),
            ));
        }
        for entry in entries {
            Self::delete_locked(queue, queue_url, &entry.receipt_handle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const QUEUE: &str = "memory://orders";

    fn request(max_messages: u32, attribute_names: &[&str]) -> ReceiveRequest {
        ReceiveRequest {
            queue_url: QUEUE.to_string(),
            max_messages,
            wait_time_seconds: 0,
            visibility_timeout_seconds: 0,
            attribute_names: attribute_names.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_receive_unknown_queue() {
        let queue = InMemoryQueue::new();
        let err = queue.receive(&request(1, &[])).await.expect_err("queue does not exist");
        assert!(matches!(err, QueueError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_receive_respects_max_messages() {
        let queue = InMemoryQueue::new();
        for i in 0..3 {
            queue.send(QUEUE, format!("body-{i}"));
        }

        let received = queue.receive(&request(2, &[])).await.expect("receive");
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].body, "body-0");
        assert_eq!(queue.ready_count(QUEUE), 1);
        assert_eq!(queue.in_flight_count(QUEUE), 2);
    }

    #[tokio::test]
    async fn test_receive_filters_attributes() {
        let queue = InMemoryQueue::new();
        let attributes = HashMap::from([
            ("type".to_string(), "order".to_string()),
            ("region".to_string(), "eu".to_string()),
        ]);
        queue.send_with_attributes(QUEUE, "a", attributes.clone());
        queue.send_with_attributes(QUEUE, "b", attributes);

        let only_type = queue.receive(&request(1, &["type"])).await.expect("receive");
        assert_eq!(only_type[0].attributes.len(), 1);

        let all = queue.receive(&request(1, &["All"])).await.expect("receive");
        assert_eq!(all[0].attributes.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_release() {
        let queue = InMemoryQueue::new();
        let first = queue.send(QUEUE, "a");
        queue.send(QUEUE, "b");

        let received = queue.receive(&request(2, &[])).await.expect("receive");
        queue
            .delete(QUEUE, &received[0].receipt_handle)
            .await
            .expect("delete");
        assert_eq!(queue.deleted_ids(QUEUE), vec![first]);

        assert!(queue.delete(QUEUE, "bogus").await.is_err());

        queue.release_in_flight(QUEUE);
        assert_eq!(queue.in_flight_count(QUEUE), 0);
        assert_eq!(queue.ready_count(QUEUE), 1);
    }

    #[tokio::test]
    async fn test_delete_batch_is_all_or_nothing() {
        let queue = InMemoryQueue::new();
        queue.send(QUEUE, "a");
        queue.send(QUEUE, "b");
        let received = queue.receive(&request(2, &[])).await.expect("receive");

        let mut entries: Vec<_> = received.iter().map(Message::delete_entry).collect();
        entries.push(DeleteEntry {
            id: "x".into(),
            receipt_handle: "bogus".into(),
        });
        assert!(queue.delete_batch(QUEUE, &entries).await.is_err());
        assert_eq!(queue.in_flight_count(QUEUE), 2);

        entries.pop();
        queue.delete_batch(QUEUE, &entries).await.expect("delete batch");
        assert_eq!(queue.deleted_ids(QUEUE).len(), 2);
    }
}
