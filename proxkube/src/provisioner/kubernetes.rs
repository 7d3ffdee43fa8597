//! MicroK8s installation, join and kubeconfig retrieval.

use super::{find_first_master, join_targets, Provisioner};
use crate::errors::{ProvisionError, Result};
use crate::model::{Cluster, KubernetesNode, NodeType};
use serde::Deserialize;

/// Reply of `microk8s add-node --format json`.
#[derive(Debug, Deserialize)]
struct JoinToken {
    urls: Vec<String>,
}

impl JoinToken {
    fn parse(reply: &str) -> Result<Self> {
        serde_json::from_str(reply)
            .map_err(|e| ProvisionError::protocol(format!("invalid join token reply: {e}")))
    }
}

impl Provisioner {
    pub(super) async fn install_kubernetes(&self, cluster: &Cluster) -> Result<()> {
        self.for_each_node(cluster, |p, cluster, node| async move {
            p.install_microk8s(&cluster, &node).await
        })
        .await
    }

    async fn install_microk8s(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        let mut install = "sudo snap install microk8s --classic".to_string();
        if let Some(channel) = &self.config.kubernetes_channel {
            install.push_str(&format!(" --channel={channel}"));
        }
        self.observe(
            format!("[VM{}] Install Kubernetes", node.vmid),
            self.run_on(cluster, node, &install),
        )
        .await?;
        self.observe(
            format!("[VM{}] Wait for Kubernetes readiness", node.vmid),
            self.run_on(cluster, node, "sudo microk8s status --wait-ready"),
        )
        .await
        .map(drop)
    }

    /// Resolves the first master, reporting a failure as its own session.
    pub(super) fn first_master<'a>(&self, cluster: &'a Cluster) -> Result<&'a KubernetesNode> {
        find_first_master(cluster).map_err(|e| {
            self.events.start("Find first master node").report_error(&e);
            e
        })
    }

    pub(super) async fn join_nodes_to_cluster(&self, cluster: &Cluster) -> Result<()> {
        if cluster.nodes.len() < 2 {
            self.events.start("No nodes to join").done();
            return Ok(());
        }

        let master = self.first_master(cluster)?;

        for node in join_targets(cluster, master) {
            let url = self
                .observe(
                    format!("[VM{}] Generate join token", node.vmid),
                    self.generate_join_url(cluster, master, node.vmid),
                )
                .await?;
            self.observe(
                format!("[VM{}] Join node to cluster", node.vmid),
                self.join_node(cluster, master, node, url),
            )
            .await?;
        }
        Ok(())
    }

    async fn generate_join_url(&self, cluster: &Cluster, master: &KubernetesNode, vmid: u32) -> Result<String> {
        let reply = self
            .run_on(cluster, master, "sudo microk8s add-node --format json")
            .await?;
        JoinToken::parse(&reply)?
            .urls
            .into_iter()
            .next()
            .ok_or(ProvisionError::MissingJoinUrl { vmid })
    }

    async fn join_node(
        &self,
        cluster: &Cluster,
        master: &KubernetesNode,
        node: &KubernetesNode,
        url: String,
    ) -> Result<()> {
        let hosts_entry = format!(
            "echo '{} {}' | sudo tee -a /etc/hosts",
            node.ip_address,
            node.vm_name(&cluster.cluster_name)
        );
        self.run_on(cluster, master, &hosts_entry).await?;

        let mut join = format!("sudo microk8s join {url}");
        if node.node_type == NodeType::Worker {
            join.push_str(" --worker");
        }
        self.run_on(cluster, node, &join).await?;
        tracing::info!(vmid = node.vmid, node_type = %node.node_type, "Node joined cluster");
        Ok(())
    }

    pub(super) async fn fetch_kube_config(&self, cluster: &Cluster) -> Result<()> {
        let master = self.first_master(cluster)?;

        let kube_config = self
            .observe(
                "Get KubeConfig from cluster".to_string(),
                self.run_on(cluster, master, "sudo microk8s config"),
            )
            .await?;
        self.observe(
            "Add Kubernetes config to project file".to_string(),
            self.store_kube_config(&cluster.cluster_name, kube_config),
        )
        .await
    }

    async fn store_kube_config(&self, cluster_name: &str, kube_config: String) -> Result<()> {
        let mut stored = self.store.load_cluster(cluster_name).await?;
        stored.kube_config = Some(kube_config);
        self.store.save_cluster(&stored).await?;
        Ok(())
    }
}
