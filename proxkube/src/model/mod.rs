//! Cluster definition and provisioning request types.

mod cluster;
mod request;

pub use cluster::{Addon, Cluster, HelmApp, K8sResource, KeyPair, KubernetesNode, Network, NodeType};
pub use request::{ProvisionRequest, ProvisionStages};
