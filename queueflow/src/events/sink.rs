//! Event sink trait and implementations.

use super::ConsumerEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn, Level};

/// Receives consumer events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: ConsumerEvent) {
        self.try_emit(event);
    }

    /// Emits an event without blocking.
    ///
    /// Must never panic; sinks swallow their own failures.
    fn try_emit(&self, event: ConsumerEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: ConsumerEvent) {}
}

/// Forwards events to `tracing` at each event's own level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// Events below this level are dropped.
    min_level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self {
            min_level: Level::DEBUG,
        }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink that drops events below `min_level`.
    #[must_use]
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }

    /// Logs only warnings and errors.
    #[must_use]
    pub fn failures_only() -> Self {
        Self::new(Level::WARN)
    }

    fn log_event(&self, event: &ConsumerEvent) {
        let level = event.level();
        // tracing orders levels by verbosity: ERROR < WARN < ... < TRACE.
        if level > self.min_level {
            return;
        }

        let event_type = event.event_type();
        let data = event.to_json();
        match level {
            Level::ERROR => error!(event_type, event_data = %data, "Event: {}", event_type),
            Level::WARN => warn!(event_type, event_data = %data, "Event: {}", event_type),
            Level::INFO => info!(event_type, event_data = %data, "Event: {}", event_type),
            Level::DEBUG => debug!(event_type, event_data = %data, "Event: {}", event_type),
            _ => trace!(event_type, event_data = %data, "Event: {}", event_type),
        }
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: ConsumerEvent) {
        self.log_event(&event);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<ConsumerEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ConsumerEvent> {
        self.events.read().clone()
    }

    /// Returns the collected event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(ConsumerEvent::event_type).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Counts events of one type.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: ConsumerEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(ConsumerEvent::started("q")).await;
        sink.try_emit(ConsumerEvent::BatchProcessed { size: 1 });
    }

    #[tokio::test]
    async fn test_logging_sink_accepts_every_level() {
        let sink = LoggingEventSink::failures_only();
        sink.emit(ConsumerEvent::started("q")).await;
        sink.try_emit(ConsumerEvent::ReceiveFailed {
            error: "network".into(),
        });
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(ConsumerEvent::started("q")).await;
        sink.try_emit(ConsumerEvent::MessageDeleted {
            message_id: "m-1".into(),
        });
        sink.try_emit(ConsumerEvent::MessageDeleted {
            message_id: "m-2".into(),
        });

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.event_types(),
            vec!["consumer.started", "message.deleted", "message.deleted"]
        );
        assert_eq!(sink.count("message.deleted"), 2);

        sink.clear();
        assert!(sink.is_empty());
    }
}
