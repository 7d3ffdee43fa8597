//! Fan-out/fan-in executor for independent units of work.
//!
//! Units start running as soon as they are added. Their results are funneled
//! through one channel into a single collector task, so the result list is
//! ordered by completion. A failing unit never cancels its siblings; the
//! caller inspects the results after [`TaskExecutor::wait`].

use crate::errors::ProvisionError;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outcome of one unit of work.
pub type TaskResult<T, E = ProvisionError> = Result<T, E>;

/// Spawns units of work concurrently and collects their results.
pub struct TaskExecutor<T, E = ProvisionError> {
    sender: mpsc::UnboundedSender<TaskResult<T, E>>,
    collector: JoinHandle<Vec<TaskResult<T, E>>>,
    handles: Vec<JoinHandle<()>>,
}

impl<T, E> TaskExecutor<T, E>
where
    T: Send + 'static,
    E: From<ProvisionError> + Send + 'static,
{
    /// Creates an executor and its result collector.
    #[must_use]
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let collector = tokio::spawn(async move {
            let mut results = Vec::new();
            while let Some(result) = receiver.recv().await {
                results.push(result);
            }
            results
        });

        Self {
            sender,
            collector,
            handles: Vec::new(),
        }
    }

    /// Starts `work` on the runtime.
    pub fn add_task<F, Fut>(&mut self, work: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult<T, E>> + Send + 'static,
    {
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            let result = work().await;
            // The collector only stops after every sender is dropped.
            let _ = sender.send(result);
        });
        self.handles.push(handle);
    }

    /// Returns the number of submitted units.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every submitted unit and returns the collected results.
    pub async fn wait(self) -> TaskResults<T, E> {
        let Self {
            sender,
            collector,
            handles,
        } = self;

        let mut panicked = Vec::new();
        for outcome in futures::future::join_all(handles).await {
            if let Err(join_error) = outcome {
                tracing::error!(error = %join_error, "Task terminated abnormally");
                panicked.push(Err(E::from(ProvisionError::TaskPanicked(
                    join_error.to_string(),
                ))));
            }
        }

        drop(sender);
        let mut results = match collector.await {
            Ok(results) => results,
            Err(join_error) => vec![Err(E::from(ProvisionError::TaskPanicked(
                join_error.to_string(),
            )))],
        };
        results.extend(panicked);

        TaskResults { results }
    }
}

impl<T, E> Default for TaskExecutor<T, E>
where
    T: Send + 'static,
    E: From<ProvisionError> + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for TaskExecutor<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("task_count", &self.handles.len())
            .finish_non_exhaustive()
    }
}

/// Results collected by a [`TaskExecutor`], in completion order.
#[derive(Debug)]
pub struct TaskResults<T, E = ProvisionError> {
    results: Vec<TaskResult<T, E>>,
}

impl<T, E> TaskResults<T, E> {
    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true when no unit was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterates over all results.
    pub fn iter(&self) -> impl Iterator<Item = &TaskResult<T, E>> {
        self.results.iter()
    }

    /// Successful values, in completion order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    /// First error found by a linear scan.
    #[must_use]
    pub fn any_error(&self) -> Option<&E> {
        self.results.iter().find_map(|r| r.as_ref().err())
    }

    /// Returns every value, or the first error.
    pub fn into_result(self) -> Result<Vec<T>, E> {
        self.results.into_iter().collect()
    }
}

impl<T, E> IntoIterator for TaskResults<T, E> {
    type Item = TaskResult<T, E>;
    type IntoIter = std::vec::IntoIter<TaskResult<T, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
