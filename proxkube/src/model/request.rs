//! Provisioning request and its stage gates.

use super::Cluster;
use serde::{Deserialize, Serialize};

/// Independent switches selecting which stages run.
///
/// Any subset may be enabled, which lets a caller rerun a single stage (for
/// example only the Helm apps) against an existing cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisionStages {
    /// Create, boot, update and reboot the VMs.
    pub create_virtual_machines: bool,
    /// Enable OS services required by storage add-ons.
    pub setup_virtual_machines: bool,
    /// Install MicroK8s on every node.
    pub install_kubernetes: bool,
    /// Join every node to the first master.
    pub join_nodes_to_cluster: bool,
    /// Enable MicroK8s add-ons.
    pub install_addons: bool,
    /// Install Helm charts.
    #[serde(alias = "installCustomHelmApps")]
    pub install_helm_apps: bool,
    /// Apply raw manifests.
    #[serde(alias = "installCustomK8sResources")]
    pub install_k8s_resources: bool,
}

impl ProvisionStages {
    /// Every stage enabled.
    #[must_use]
    pub fn all() -> Self {
        Self {
            create_virtual_machines: true,
            setup_virtual_machines: true,
            install_kubernetes: true,
            join_nodes_to_cluster: true,
            install_addons: true,
            install_helm_apps: true,
            install_k8s_resources: true,
        }
    }

    /// No stage enabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true when the kubeconfig should be fetched after the run.
    #[must_use]
    pub fn fetches_kube_config(&self) -> bool {
        self.install_kubernetes || self.join_nodes_to_cluster
    }
}

/// A cluster definition plus the stages to run against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    /// Stage gates.
    #[serde(default)]
    pub stages: ProvisionStages,
    /// Target cluster.
    pub cluster: Cluster,
}

impl ProvisionRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(cluster: Cluster, stages: ProvisionStages) -> Self {
        Self { stages, cluster }
    }
}
