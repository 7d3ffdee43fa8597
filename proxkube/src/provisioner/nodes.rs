//! Node roles within a cluster.

use crate::errors::{ProvisionError, Result};
use crate::model::{Cluster, KubernetesNode};

/// Returns the master with the lowest VM id.
///
/// The first master coordinates the join and serves every cluster-wide
/// command (add-ons, Helm, manifests, kubeconfig).
pub fn find_first_master(cluster: &Cluster) -> Result<&KubernetesNode> {
    cluster
        .nodes
        .iter()
        .filter(|n| n.is_master())
        .min_by_key(|n| n.vmid)
        .ok_or_else(|| ProvisionError::NoMasterNode {
            cluster: cluster.cluster_name.clone(),
        })
}

/// Every node except `master`, in definition order.
#[must_use]
pub fn join_targets<'a>(cluster: &'a Cluster, master: &KubernetesNode) -> Vec<&'a KubernetesNode> {
    cluster
        .nodes
        .iter()
        .filter(|n| n.vmid != master.vmid)
        .collect()
}
