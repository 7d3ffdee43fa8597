//! The shared, append-only event log.

use super::{Event, EventSink, EventState, Session};
use crate::utils::generate_uuid;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Source name stamped on events when none is configured.
pub const DEFAULT_SOURCE: &str = "proxkube";

struct Inner {
    source: String,
    events: Mutex<Vec<Event>>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

/// Ordered, append-only log of correlated events.
///
/// Cloning the log yields another handle onto the same storage. Appends from
/// any number of tasks are serialized through one lock, and readers receive
/// a snapshot copy.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<Inner>,
}

impl EventLog {
    /// Creates an empty log whose sessions are stamped with `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: source.into(),
                events: Mutex::new(Vec::new()),
                sinks: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Registers a sink that sees every appended event.
    #[must_use]
    pub fn with_sink(self, sink: Arc<dyn EventSink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Registers a sink on an existing log.
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.inner.sinks.write().push(sink);
    }

    /// Source name stamped on session events.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Opens a session named `name`.
    pub fn start(&self, name: impl Into<String>) -> Session {
        self.start_with_details(name, "")
    }

    /// Opens a session named `name` whose `Started` event carries `details`.
    pub fn start_with_details(&self, name: impl Into<String>, details: impl Into<String>) -> Session {
        let name = name.into();
        let correlation_id = generate_uuid();
        self.add(
            Event::new(correlation_id, self.source(), name.clone(), EventState::Started)
                .with_details(details),
        );
        Session::new(self.clone(), correlation_id, name)
    }

    /// Appends an event.
    ///
    /// Sinks are notified under the events lock, so they observe events in
    /// stored order. A sink must not call back into the log.
    pub fn add(&self, event: Event) {
        let mut events = self.inner.events.lock();
        events.push(event);
        if let Some(stored) = events.last() {
            for sink in self.inner.sinks.read().iter() {
                sink.try_emit(stored);
            }
        }
    }

    /// Returns a snapshot of all events in append order.
    #[must_use]
    pub fn get(&self) -> Vec<Event> {
        self.inner.events.lock().clone()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.events.lock().len()
    }

    /// Returns true if the log holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.events.lock().is_empty()
    }

    /// Removes every event and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut events = self.inner.events.lock();
        let count = events.len();
        events.clear();
        count
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("source", &self.inner.source)
            .field("len", &self.len())
            .field("sinks", &self.inner.sinks.read().len())
            .finish()
    }
}
