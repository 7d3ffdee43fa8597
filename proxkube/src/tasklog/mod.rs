//! Task log read model.
//!
//! Folds the correlated [`Event`](crate::events::Event) stream into one
//! [`Task`] per operation for display.

mod reader;
mod task;

pub use reader::{EventSource, TaskLogReader};
pub use task::{Task, TaskDuration};
