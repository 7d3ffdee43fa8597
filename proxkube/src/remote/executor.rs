//! The remote execution contract.

use super::{ExecuteOptions, ExecutionResult};
use crate::errors::RemoteError;
use crate::pipeline::retry;
use async_trait::async_trait;
use std::fmt;

/// Failed attempt inside [`RemoteExecutor::execute_with_options`].
enum AttemptFailure {
    Transport(RemoteError),
    Exit(ExecutionResult),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => e.fmt(f),
            Self::Exit(result) => match result.error() {
                Some(e) => e.fmt(f),
                None => f.write_str("command failed"),
            },
        }
    }
}

/// Runs shell commands on one remote host.
///
/// Implementations only provide [`execute_once`](Self::execute_once): one
/// connection, one command, one result. Retries and output checking are
/// layered on top.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Host this executor talks to.
    fn host(&self) -> &str;

    /// Runs `command` once, feeding `stdin` if given.
    ///
    /// Returns `Err` only when no exit status was produced.
    async fn execute_once(&self, command: &str, stdin: Option<&str>) -> Result<ExecutionResult, RemoteError>;

    /// Runs `command` once.
    async fn execute(&self, command: &str) -> Result<ExecutionResult, RemoteError> {
        self.execute_once(command, None).await
    }

    /// Runs a command with retries.
    ///
    /// Both transport errors and non-zero exits trigger another attempt.
    /// The outcome of the last attempt is returned: `Err` if it failed at
    /// the transport level, otherwise its result, which may be a failure.
    async fn execute_with_options(&self, options: &ExecuteOptions) -> Result<ExecutionResult, RemoteError> {
        let command = options.command.as_str();
        let stdin = options.stdin.as_deref();

        let outcome = retry(options.retries, options.delay, |_| async move {
            match self.execute_once(command, stdin).await {
                Ok(result) if result.is_error() => Err(AttemptFailure::Exit(result)),
                Ok(result) => Ok(result),
                Err(e) => Err(AttemptFailure::Transport(e)),
            }
        })
        .await;

        match outcome {
            Ok(result) | Err(AttemptFailure::Exit(result)) => Ok(result),
            Err(AttemptFailure::Transport(e)) => Err(e),
        }
    }

    /// Runs `command` once and returns stdout, failing on a non-zero exit.
    async fn run(&self, command: &str) -> Result<String, RemoteError> {
        self.execute(command).await?.into_output()
    }

    /// Like [`run`](Self::run) with retries and stdin.
    async fn run_with_options(&self, options: &ExecuteOptions) -> Result<String, RemoteError> {
        self.execute_with_options(options).await?.into_output()
    }
}
