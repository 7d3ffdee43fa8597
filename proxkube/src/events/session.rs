//! Start/terminal event pairing for one logical operation.

use super::{Event, EventLog, EventState};
use std::fmt::Display;
use uuid::Uuid;

/// Logging handle bound to one correlation id.
///
/// A session emits its `Started` event when opened through
/// [`EventLog::start`]. The terminal methods consume the session, so each
/// session reports at most one `Finished` or `Error` event.
#[must_use = "a session must be closed with done() or report_error()"]
pub struct Session {
    log: EventLog,
    correlation_id: Uuid,
    name: String,
    closed: bool,
}

impl Session {
    pub(super) fn new(log: EventLog, correlation_id: Uuid, name: String) -> Self {
        Self {
            log,
            correlation_id,
            name,
            closed: false,
        }
    }

    /// Correlation id shared by every event of this session.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Closes the session with an `Error` event carrying the error text.
    pub fn report_error(mut self, err: &dyn Display) {
        self.close(EventState::Error, err.to_string());
    }

    /// Closes the session with a `Finished` event.
    pub fn done(mut self) {
        self.close(EventState::Finished, String::new());
    }

    /// Closes the session with a `Finished` event carrying `details`.
    pub fn done_with_details(mut self, details: impl Into<String>) {
        self.close(EventState::Finished, details.into());
    }

    /// Closes the session according to `result` and passes it through.
    ///
    /// `Ok` emits `Finished`, `Err` emits `Error` with the error text.
    pub fn finish<T, E: Display>(self, result: Result<T, E>) -> Result<T, E> {
        match &result {
            Ok(_) => self.done(),
            Err(e) => self.report_error(e),
        }
        result
    }

    fn close(&mut self, state: EventState, details: String) {
        self.closed = true;
        self.log.add(
            Event::new(self.correlation_id, self.log.source(), self.name.clone(), state)
                .with_details(details),
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                correlation_id = %self.correlation_id,
                name = %self.name,
                "Session dropped without a terminal event"
            );
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("correlation_id", &self.correlation_id)
            .field("name", &self.name)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
