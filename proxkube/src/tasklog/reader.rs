//! Groups raw events into tasks.

use super::{Task, TaskDuration};
use crate::events::{Event, EventLog};
use crate::utils::now_utc;
use std::collections::HashMap;
use uuid::Uuid;

/// Supplies the events a [`TaskLogReader`] folds.
pub trait EventSource: Send + Sync {
    /// Returns the current events.
    fn events(&self) -> Vec<Event>;
}

impl EventSource for EventLog {
    fn events(&self) -> Vec<Event> {
        self.get()
    }
}

impl EventSource for Vec<Event> {
    fn events(&self) -> Vec<Event> {
        self.clone()
    }
}

/// Read model turning the event stream into one [`Task`] per correlation id.
#[derive(Debug, Clone)]
pub struct TaskLogReader<S> {
    source: S,
}

impl<S: EventSource> TaskLogReader<S> {
    /// Creates a reader over `source`.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Returns the tasks, most recent first.
    ///
    /// Each group of events is sorted by creation time and folded: the
    /// first event seeds the creation time and measures the duration up to
    /// now, every later event measures it up to its own creation time. The
    /// state and name always come from the latest event. Durations of
    /// unfinished tasks grow between calls.
    #[must_use]
    pub fn logs(&self) -> Vec<Task> {
        let mut groups: HashMap<Uuid, Vec<Event>> = HashMap::new();
        for event in self.source.events() {
            groups.entry(event.correlation_id).or_default().push(event);
        }

        let now = now_utc();
        let mut tasks: Vec<Task> = groups
            .into_values()
            .filter_map(|mut events| {
                events.sort_by_key(|e| e.create_time);
                fold(events, now)
            })
            .collect();

        tasks.sort_by(|a, b| b.create_time.cmp(&a.create_time));
        tasks
    }
}

fn fold(events: Vec<Event>, now: crate::utils::Timestamp) -> Option<Task> {
    let mut events = events.into_iter();
    let first = events.next()?;

    let mut task = Task {
        correlation_id: first.correlation_id,
        create_time: first.create_time,
        duration: TaskDuration(now - first.create_time),
        name: first.name,
        details: Vec::new(),
        state: first.state,
    };
    if !first.details.is_empty() {
        task.details.push(first.details);
    }

    for event in events {
        task.duration = TaskDuration(event.create_time - task.create_time);
        task.state = event.state;
        task.name = event.name;
        if !event.details.is_empty() {
            task.details.push(event.details);
        }
    }

    Some(task)
}
