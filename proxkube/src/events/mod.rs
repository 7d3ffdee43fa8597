//! Correlated event logging.
//!
//! Every provisioning operation opens a [`Session`] on the shared
//! [`EventLog`], which records a `Started` event, and closes it with exactly
//! one `Finished` or `Error` event. The task log read model folds these
//! events back into one entry per operation.

mod event;
mod log;
mod session;
mod sink;

pub use event::{Event, EventState};
pub use log::{EventLog, DEFAULT_SOURCE};
pub use session::Session;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
