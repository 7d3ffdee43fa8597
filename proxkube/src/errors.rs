//! Error types for the provisioning engine.
//!
//! Errors fall into four families: transport failures (SSH or HTTP could not
//! complete a request), remote command failures (a command ran and exited
//! non-zero), protocol errors (a peer answered with something unparseable)
//! and data errors (a named entity does not exist). The first two are
//! retried by callers that wrap them in [`crate::pipeline::retry`]; the other
//! two are fatal to the current stage.

use thiserror::Error;

/// The main error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A remote command could not be executed or exited non-zero.
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// The hypervisor API rejected or failed a request.
    #[error("{0}")]
    Hypervisor(#[from] HypervisorError),

    /// The cluster store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A remote peer answered with malformed data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The cluster has no master node to coordinate the join.
    #[error("No master node found in cluster [{cluster}]")]
    NoMasterNode {
        /// Cluster name.
        cluster: String,
    },

    /// The join token returned by the first master has no URL.
    #[error("Join token for node [{vmid}] does not contain any URL")]
    MissingJoinUrl {
        /// VM id of the node being joined.
        vmid: u32,
    },

    /// A VM id requested for creation is already used on the hypervisor.
    #[error("VM with id [{0}] already exists")]
    VmIdInUse(u32),

    /// A VM did not reach the stopped state in time.
    #[error("VM [{0}] is still running")]
    VmStillRunning(u32),

    /// SSH key pair generation failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// A unit of work submitted to the task executor panicked.
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true if retrying the failed operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(_) | Self::VmStillRunning(_) => true,
            Self::Hypervisor(e) => e.is_transport(),
            _ => false,
        }
    }
}

/// Errors from the remote execution contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The command never produced an exit status (connection refused,
    /// handshake failure, spawn failure).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The command ran and exited with a non-zero code.
    #[error("[{code}] - {output}")]
    CommandFailed {
        /// Exit code of the remote process.
        code: i32,
        /// Captured stderr, or stdout when stderr was empty.
        output: String,
    },
}

impl RemoteError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns the exit code, `-1` for transport failures.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport(_) => -1,
            Self::CommandFailed { code, .. } => *code,
        }
    }
}

/// Errors from the hypervisor API.
#[derive(Debug, Error)]
pub enum HypervisorError {
    /// The request did not reach the hypervisor or the connection broke.
    #[error("Hypervisor transport error: {0}")]
    Transport(String),

    /// The hypervisor answered with a non-2xx status.
    #[error("Hypervisor returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The hypervisor answered with an unexpected payload.
    #[error("Hypervisor protocol error: {0}")]
    Protocol(String),

    /// A VM definition failed validation before being sent.
    #[error("Invalid VM definition: {0}")]
    InvalidDefinition(String),
}

impl HypervisorError {
    /// Returns true for connection-level failures.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Errors from the cluster store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No cluster with the given name exists.
    #[error("Cluster [{0}] not found")]
    ClusterNotFound(String),

    /// The backing storage failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;
