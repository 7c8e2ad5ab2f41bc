//! Event sink trait and implementations.

use tracing::{debug, info, Level};

/// Trait for event sinks that can receive events.
///
/// Workers call `try_emit` inline while processing messages, so
/// implementations must be cheap and must never block or panic.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Records an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "worker.spawned")
    /// * `data` - Optional event data
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        if self.level == Level::DEBUG {
            debug!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
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

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.try_emit("test", Some(serde_json::json!({"x": 1})));
        LoggingEventSink::debug().try_emit("test.event", None);
        LoggingEventSink::default().try_emit("test.event", Some(serde_json::json!({"key": "value"})));
    }

    #[test]
    fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.try_emit("worker.spawned", None);
        sink.try_emit("worker.stopped", None);
        sink.try_emit("stage.failed", Some(serde_json::json!({"message": "boom"})));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("worker.").len(), 2);
        assert_eq!(sink.events()[2].1, Some(serde_json::json!({"message": "boom"})));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_mock_sink_expectations() {
        let mut sink = MockEventSink::new();
        sink.expect_try_emit()
            .withf(|event_type, _| event_type == "pipeline.built")
            .times(1)
            .return_const(());

        sink.try_emit("pipeline.built", None);
    }
}
