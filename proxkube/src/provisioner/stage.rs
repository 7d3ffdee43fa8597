//! Provisioning stages.

use std::fmt;

/// One independently gated phase of [`super::Provisioner::create_cluster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Generate and persist a key pair when the cluster has none.
    KeyBootstrap,
    /// Create and configure one VM per node.
    CreateVirtualMachines,
    /// Power VMs on and wait for SSH.
    StartVirtualMachines,
    /// Upgrade the guest OS packages.
    UpdateVmsOs,
    /// Power VMs off and wait until stopped.
    ShutdownVirtualMachines,
    /// Enable OS services used by storage add-ons.
    SetupVirtualMachines,
    /// Install MicroK8s on every node.
    InstallKubernetes,
    /// Join every node to the first master.
    JoinNodesToCluster,
    /// Store the cluster kubeconfig in the project.
    FetchKubeConfig,
    /// Enable MicroK8s add-ons.
    InstallAddons,
    /// Install Helm charts.
    InstallHelmApps,
    /// Apply raw manifests.
    InstallK8sResources,
    /// Destroy every node VM of a cluster being deleted.
    DeleteVirtualMachines,
    /// Drop the deleted cluster from the store.
    RemoveCluster,
}

impl Stage {
    /// Stage name as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyBootstrap => "KeyBootstrap",
            Self::CreateVirtualMachines => "CreateVirtualMachines",
            Self::StartVirtualMachines => "StartVirtualMachines",
            Self::UpdateVmsOs => "UpdateVmsOs",
            Self::ShutdownVirtualMachines => "ShutdownVirtualMachines",
            Self::SetupVirtualMachines => "SetupVirtualMachines",
            Self::InstallKubernetes => "InstallKubernetes",
            Self::JoinNodesToCluster => "JoinNodesToCluster",
            Self::FetchKubeConfig => "FetchKubeConfig",
            Self::InstallAddons => "InstallAddons",
            Self::InstallHelmApps => "InstallHelmApps",
            Self::InstallK8sResources => "InstallK8sResources",
            Self::DeleteVirtualMachines => "DeleteVirtualMachines",
            Self::RemoveCluster => "RemoveCluster",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
