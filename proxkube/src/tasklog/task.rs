//! Folded view of one correlated operation.

use crate::events::EventState;
use crate::utils::{format_seconds, Timestamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Elapsed time of a task, serialized as seconds with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskDuration(pub chrono::Duration);

impl TaskDuration {
    /// Returns the inner duration.
    #[must_use]
    pub fn as_duration(&self) -> chrono::Duration {
        self.0
    }
}

impl std::fmt::Display for TaskDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", format_seconds(self.0))
    }
}

impl Serialize for TaskDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_seconds(self.0))
    }
}

impl<'de> Deserialize<'de> for TaskDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let seconds: f64 = raw.parse().map_err(serde::de::Error::custom)?;
        #[allow(clippy::cast_possible_truncation)]
        let millis = (seconds * 1_000.0).round() as i64;
        Ok(Self(chrono::Duration::milliseconds(millis)))
    }
}

/// One entry of the task log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Correlation id of the folded events.
    pub correlation_id: Uuid,
    /// Creation time of the first event.
    pub create_time: Timestamp,
    /// Elapsed time, see [`crate::tasklog::TaskLogReader::logs`].
    pub duration: TaskDuration,
    /// Name of the last event.
    pub name: String,
    /// Non-empty details of every event, in order.
    #[serde(default)]
    pub details: Vec<String>,
    /// State of the last event.
    pub state: EventState,
}

impl Task {
    /// Returns true while the operation has not reported a terminal event.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.state == EventState::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duration_serializes_as_seconds_string() {
        let duration = TaskDuration(chrono::Duration::milliseconds(1_500));
        assert_eq!(serde_json::to_string(&duration).unwrap(), "\"1.50\"");
        assert_eq!(duration.to_string(), "1.50s");
    }

    #[test]
    fn test_duration_deserializes() {
        let duration: TaskDuration = serde_json::from_str("\"2.25\"").unwrap();
        assert_eq!(duration.as_duration(), chrono::Duration::milliseconds(2_250));
        assert!(serde_json::from_str::<TaskDuration>("\"soon\"").is_err());
    }
}
