//! Remote command execution.
//!
//! The orchestrator talks to hosts only through [`RemoteExecutor`]: run a
//! command, get back an exit code and output. [`SshClient`] implements it
//! with the system OpenSSH client; tests use the recording fakes from
//! [`crate::testing`].

mod connector;
mod execution;
mod executor;
mod keys;
mod ssh;

pub use connector::{OpenSshConnector, RemoteConnector};
pub use execution::{ExecuteOptions, ExecutionError, ExecutionResult, NO_EXIT_STATUS};
pub use executor::RemoteExecutor;
pub use keys::{KeyPairGenerator, SshKeygen};
pub use ssh::{SshAuth, SshClient};
