//! Results and options of remote command execution.

use crate::errors::RemoteError;
use std::fmt;
use std::time::Duration;

/// Exit code reported when no process exit status exists.
pub const NO_EXIT_STATUS: i32 = -1;

const NO_OUTPUT: &str = "[NO OUTPUT]";

/// Failure part of an [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Exit code of the remote process.
    pub code: i32,
    /// Stderr, or stdout when stderr was empty.
    pub output: String,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] - {}", self.code, self.output)
    }
}

impl From<ExecutionError> for RemoteError {
    fn from(e: ExecutionError) -> Self {
        Self::CommandFailed {
            code: e.code,
            output: e.output,
        }
    }
}

/// Outcome of one remote command that produced an exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    output: String,
    code: i32,
    error: Option<ExecutionError>,
}

impl ExecutionResult {
    /// Builds a result from the raw process outcome.
    ///
    /// On a non-zero exit the error output prefers `stderr`, then `stdout`,
    /// then a fixed `[NO OUTPUT]` marker.
    #[must_use]
    pub fn new(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stdout = stdout.into();
        if code == 0 {
            return Self::success(stdout);
        }

        let stderr = stderr.into();
        let output = if !stderr.trim().is_empty() {
            stderr
        } else if !stdout.trim().is_empty() {
            stdout.clone()
        } else {
            NO_OUTPUT.to_string()
        };

        Self {
            output: stdout,
            code,
            error: Some(ExecutionError { code, output }),
        }
    }

    /// A successful result with `stdout`.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            output: stdout.into(),
            code: 0,
            error: None,
        }
    }

    /// A failed result with exit `code` and error output.
    #[must_use]
    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self::new(code, String::new(), output)
    }

    /// Stdout of the command.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Exit code.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Returns true when the command exited non-zero.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    /// Returns stdout, or the failure as [`RemoteError::CommandFailed`].
    pub fn into_output(self) -> Result<String, RemoteError> {
        match self.error {
            Some(e) => Err(e.into()),
            None => Ok(self.output),
        }
    }
}

/// Parameters of [`RemoteExecutor::execute_with_options`](super::RemoteExecutor::execute_with_options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Shell command to run.
    pub command: String,
    /// Data written to the command's stdin.
    pub stdin: Option<String>,
    /// Attempts, zero meaning one.
    pub retries: u32,
    /// Pause after each failed attempt.
    pub delay: Duration,
}

impl ExecuteOptions {
    /// Options running `command` once.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdin: None,
            retries: 1,
            delay: Duration::ZERO,
        }
    }

    /// Sets stdin.
    #[must_use]
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Sets the retry count and delay.
    #[must_use]
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.delay = delay;
        self
    }

    /// Applies a [`RetryPolicy`](crate::pipeline::RetryPolicy).
    #[must_use]
    pub fn with_policy(self, policy: crate::pipeline::RetryPolicy) -> Self {
        self.with_retries(policy.max_attempts, policy.delay())
    }
}
