//! Fakes for testing code built on the provisioning engine.
//!
//! This module provides:
//! - A recording remote executor and connector with scripted responses
//! - An in-memory hypervisor that tracks power state
//! - Sample clusters and a fully faked [`crate::service::ProvisionerService`]

mod fixtures;
mod hypervisor;
mod mocks;

pub use fixtures::{fast_config, node_ip, test_cluster, test_node, TestHarness};
pub use hypervisor::{FakeHypervisor, HypervisorCall, HypervisorOp};
pub use mocks::{RecordedCommand, RecordingConnector, RecordingExecutor, StaticKeyGenerator};
