//! Event sink trait and implementations.

use super::{Event, EventState};
use crate::utils::iso_timestamp;
use tracing::{debug, info, warn, Level};

/// Receives a copy of every event appended to an
/// [`EventLog`](super::EventLog).
///
/// Sinks are called on the producer's task and must return quickly without
/// panicking.
pub trait EventSink: Send + Sync {
    /// Observes one event.
    fn try_emit(&self, event: &Event);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &Event) {}
}

/// Mirrors events into `tracing`.
///
/// `Error` events are always logged at WARN; other events use the configured
/// level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &Event) {
        if event.state == EventState::Error {
            warn!(
                correlation_id = %event.correlation_id,
                state = %event.state,
                create_time = %iso_timestamp(&event.create_time),
                details = %event.details,
                "{}", event.name
            );
            return;
        }

        if self.level == Level::DEBUG {
            debug!(
                correlation_id = %event.correlation_id,
                state = %event.state,
                create_time = %iso_timestamp(&event.create_time),
                details = %event.details,
                "{}", event.name
            );
        } else {
            info!(
                correlation_id = %event.correlation_id,
                state = %event.state,
                create_time = %iso_timestamp(&event.create_time),
                details = %event.details,
                "{}", event.name
            );
        }
    }
}

/// Collects events in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<Event>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
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

    /// Returns the collected events in the given state.
    #[must_use]
    pub fn events_in_state(&self, state: EventState) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|e| e.state == state)
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &Event) {
        self.events.write().push(event.clone());
    }
}
