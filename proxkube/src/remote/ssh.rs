//! [`RemoteExecutor`] backed by the OpenSSH client binary.

use super::{ExecutionResult, RemoteExecutor};
use crate::errors::RemoteError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Exit status OpenSSH uses for its own connection failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// How the client authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum SshAuth {
    /// Private key file (mode 0600).
    IdentityFile(PathBuf),
    /// Password, passed to `sshpass` through the environment.
    Password(String),
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityFile(path) => f.debug_tuple("IdentityFile").field(path).finish(),
            Self::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// One SSH target: `username@host:port`.
#[derive(Debug, Clone)]
pub struct SshClient {
    host: String,
    port: u16,
    username: String,
    auth: SshAuth,
    connect_timeout: Duration,
    program: String,
}

impl SshClient {
    /// Creates a client for `username@host` on port 22.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: SshAuth) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth,
            connect_timeout: Duration::from_secs(10),
            program: "ssh".to_string(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the `ssh` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments passed to `ssh`, excluding the remote command.
    #[must_use]
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-p".to_string(),
            self.port.to_string(),
        ];
        match &self.auth {
            SshAuth::IdentityFile(path) => {
                args.extend([
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                    "-o".to_string(),
                    "IdentitiesOnly=yes".to_string(),
                    "-i".to_string(),
                    path.display().to_string(),
                ]);
            }
            SshAuth::Password(_) => {
                args.extend([
                    "-o".to_string(),
                    "PubkeyAuthentication=no".to_string(),
                ]);
            }
        }
        args.push(format!("{}@{}", self.username, self.host));
        args
    }

    fn command(&self, remote_command: &str) -> Command {
        let mut cmd = match &self.auth {
            SshAuth::IdentityFile(_) => Command::new(&self.program),
            SshAuth::Password(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(&self.program).env("SSHPASS", password);
                cmd
            }
        };
        cmd.args(self.ssh_args())
            .arg(remote_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteExecutor for SshClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn execute_once(&self, command: &str, stdin: Option<&str>) -> Result<ExecutionResult, RemoteError> {
        tracing::debug!(host = %self.host, command, "Executing remote command");

        let mut cmd = self.command(command);
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

        let mut child = cmd
            .spawn()
            .map_err(|e| RemoteError::transport(format!("cannot spawn {}: {e}", self.program)))?;

        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(data.as_bytes())
                .await
                .map_err(|e| RemoteError::transport(format!("cannot write stdin: {e}")))?;
            // Closing the pipe signals EOF to the remote command.
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RemoteError::transport(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(SSH_CONNECTION_FAILURE) | None => Err(RemoteError::transport(format!(
                "{}@{}: {}",
                self.username,
                self.host,
                if stderr.trim().is_empty() { "connection failed" } else { stderr.trim() }
            ))),
            Some(code) => {
                let result = ExecutionResult::new(code, stdout, stderr);
                if let Some(e) = result.error() {
                    tracing::debug!(host = %self.host, command, error = %e, "Remote command failed");
                }
                Ok(result)
            }
        }
    }
}
