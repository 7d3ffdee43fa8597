//! Correlated operation events.

use crate::utils::{generate_uuid, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state carried by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    /// The operation began.
    Started,
    /// The operation completed successfully.
    Finished,
    /// The operation failed.
    Error,
}

impl EventState {
    /// Returns the wire name of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }

    /// Returns true for `Finished` and `Error`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started)
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the event log.
///
/// Events sharing a `correlation_id` belong to the same logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Groups the events of one operation.
    pub correlation_id: Uuid,
    /// Component that emitted the event.
    pub source: String,
    /// When the event was created.
    pub create_time: Timestamp,
    /// Human-readable operation name.
    pub name: String,
    /// Free-form details, empty when there are none.
    #[serde(default)]
    pub details: String,
    /// Lifecycle state.
    pub state: EventState,
}

impl Event {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        correlation_id: Uuid,
        source: impl Into<String>,
        name: impl Into<String>,
        state: EventState,
    ) -> Self {
        Self {
            correlation_id,
            source: source.into(),
            create_time: now_utc(),
            name: name.into(),
            details: String::new(),
            state,
        }
    }

    /// Creates a `Started` event with a fresh correlation id.
    #[must_use]
    pub fn started(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(generate_uuid(), source, name, EventState::Started)
    }

    /// Sets the details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Overrides the creation time.
    #[must_use]
    pub fn with_create_time(mut self, create_time: Timestamp) -> Self {
        self.create_time = create_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EventState::Started).unwrap(), "\"started\"");
        assert_eq!(serde_json::to_string(&EventState::Finished).unwrap(), "\"finished\"");
        assert_eq!(serde_json::to_string(&EventState::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = Event::started("provisioner", "Create VM").with_details("VM ID: 101");
        let json = serde_json::to_value(&event).unwrap();

        assert!(json.get("correlationId").is_some());
        assert!(json.get("createTime").is_some());
        assert_eq!(json["details"], "VM ID: 101");
        assert_eq!(json["state"], "started");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!EventState::Started.is_terminal());
        assert!(EventState::Finished.is_terminal());
        assert!(EventState::Error.is_terminal());
    }
}
