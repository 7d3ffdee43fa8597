//! Cluster deletion.

use super::vm::vm_details;
use super::{Provisioner, Stage};
use crate::errors::{ProvisionError, Result};
use crate::hypervisor::VmStatus;
use crate::model::Cluster;
use tracing::Instrument;

/// Nodes of a stored cluster that still have a VM on the hypervisor.
struct Remaining {
    cluster: Cluster,
    running: Cluster,
}

impl Provisioner {
    /// Shuts down and destroys every VM of the cluster named `cluster_name`,
    /// then removes the cluster from the store.
    ///
    /// Nodes whose VM no longer exists are skipped. VMs that ignore the
    /// shutdown request are stopped. The cluster stays in the store when
    /// any VM could not be destroyed.
    pub async fn delete_cluster(&self, cluster_name: &str) -> Result<()> {
        let span = tracing::info_span!("delete_cluster", cluster = %cluster_name);
        self.teardown(cluster_name).instrument(span).await
    }

    async fn teardown(&self, cluster_name: &str) -> Result<()> {
        let Remaining { cluster, running } = self
            .observe(format!("Load cluster [{cluster_name}]"), self.remaining_nodes(cluster_name))
            .await?;
        tracing::info!(
            nodes = cluster.nodes.len(),
            running = running.nodes.len(),
            "Deleting cluster"
        );

        self.run_stage(Stage::ShutdownVirtualMachines, self.shutdown_virtual_machines(&running))
            .await?;
        self.run_stage(Stage::DeleteVirtualMachines, self.delete_virtual_machines(&cluster))
            .await?;
        self.run_stage(
            Stage::RemoveCluster,
            self.observe(
                format!("Remove cluster [{cluster_name}]"),
                async { self.store.delete_cluster(cluster_name).await.map_err(ProvisionError::from) },
            ),
        )
        .await?;

        tracing::info!("Cluster deleted");
        Ok(())
    }

    async fn remaining_nodes(&self, cluster_name: &str) -> Result<Remaining> {
        let mut cluster = self.store.load_cluster(cluster_name).await?;
        let used = self.hypervisor.list_used_ids().await?;
        cluster.nodes.retain(|node| {
            let exists = used.contains(&node.vmid);
            if !exists {
                tracing::warn!(vmid = node.vmid, "VM does not exist, skipping it");
            }
            exists
        });

        let mut running = cluster.clone();
        running.nodes.clear();
        for node in &cluster.nodes {
            if self.hypervisor.current_status(node.vmid).await? == VmStatus::Running {
                running.nodes.push(node.clone());
            }
        }
        Ok(Remaining { cluster, running })
    }

    async fn delete_virtual_machines(&self, cluster: &Cluster) -> Result<()> {
        self.for_each_node(cluster, |p, _cluster, node| async move {
            let session = p.events.start_with_details("Delete virtual machine", vm_details(node.vmid));
            let deleted = p.hypervisor.delete_vm(node.vmid).await.map_err(ProvisionError::from);
            session.finish(deleted)
        })
        .await
    }
}
