//! # Proxkube
//!
//! Provisioning engine for MicroK8s clusters on Proxmox VE.
//!
//! A provisioning run walks a fixed sequence of stages: key bootstrap,
//! virtual machine creation and lifecycle, OS setup, Kubernetes install,
//! node join, kubeconfig retrieval and workload installation. Every remote
//! step is recorded as a pair of events sharing a correlation id, and the
//! task log folds those events into one entry per step.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use proxkube::prelude::*;
//!
//! let service = ProvisionerService::builder()
//!     .hypervisor(Arc::new(ProxmoxClient::new(
//!         "pve.local",
//!         8006,
//!         "pve",
//!         ApiToken::new("root@pam!proxkube", secret),
//!         true,
//!     )?))
//!     .host(Arc::new(SshClient::new("pve.local", "root", host_auth)))
//!     .config(ProvisionerConfig::default())
//!     .build()?;
//!
//! service.setup_environment().await?;
//! service
//!     .create_cluster(ProvisionRequest::new(cluster, ProvisionStages::all()))
//!     .await?;
//!
//! for task in service.get_task_log() {
//!     println!("{} {} {}", task.state, task.name, task.duration);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod errors;
pub mod events;
pub mod hypervisor;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod provisioner;
pub mod remote;
pub mod service;
pub mod store;
pub mod tasklog;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ProvisionerConfig;
    pub use crate::errors::{
        HypervisorError, ProvisionError, RemoteError, Result, StoreError,
    };
    pub use crate::events::{
        Event, EventLog, EventSink, EventState, LoggingEventSink, NoOpEventSink, Session,
    };
    pub use crate::hypervisor::{Hypervisor, VmDefinition, VmDefinitionBuilder, VmStatus};
    #[cfg(feature = "proxmox")]
    pub use crate::hypervisor::{ApiToken, ProxmoxClient};
    pub use crate::model::{
        Addon, Cluster, HelmApp, K8sResource, KeyPair, KubernetesNode, Network, NodeType,
        ProvisionRequest, ProvisionStages,
    };
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::pipeline::{retry, RetryPolicy, TaskExecutor, TaskResults};
    pub use crate::provisioner::{Provisioner, Stage};
    pub use crate::remote::{
        ExecuteOptions, ExecutionResult, KeyPairGenerator, OpenSshConnector, RemoteConnector,
        RemoteExecutor, SshClient,
    };
    pub use crate::service::{ProvisionerService, ProvisionerServiceBuilder};
    pub use crate::store::{ClusterStore, InMemoryClusterStore};
    pub use crate::tasklog::{Task, TaskLogReader};
    pub use std::sync::Arc;
}
