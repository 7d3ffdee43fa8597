//! Cluster provisioning orchestrator.
//!
//! [`Provisioner::create_cluster`] runs a fixed, linear sequence of stages,
//! each enabled by a flag of
//! [`ProvisionStages`](crate::model::ProvisionStages). Per-node stages fan out
//! through a [`TaskExecutor`] and wait for every node before the next stage
//! starts; cluster-wide stages run sequentially against the first master.
//! The first failing stage stops the run.
//!
//! Every remote step is reported through an [`EventLog`] session, so the
//! task log shows where a run stopped.

mod apps;
mod environment;
mod helm;
mod kubernetes;
mod nodes;
mod stage;
mod teardown;
mod vm;

#[cfg(test)]
mod provisioner_tests;

pub use helm::{values_file_path, Helm, UpgradeInstall};
pub use nodes::{find_first_master, join_targets};
pub use stage::Stage;

use crate::config::ProvisionerConfig;
use crate::errors::Result;
use crate::events::EventLog;
use crate::hypervisor::Hypervisor;
use crate::model::{Cluster, KubernetesNode, ProvisionRequest};
use crate::observability::StageTimer;
use crate::pipeline::TaskExecutor;
use crate::remote::{KeyPairGenerator, RemoteConnector, RemoteExecutor};
use crate::store::ClusterStore;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// Drives a cluster from bare hypervisor to running workloads.
///
/// Cloning is cheap; clones share every collaborator and the event log.
#[derive(Clone)]
pub struct Provisioner {
    hypervisor: Arc<dyn Hypervisor>,
    host: Arc<dyn RemoteExecutor>,
    connector: Arc<dyn RemoteConnector>,
    store: Arc<dyn ClusterStore>,
    keys: Arc<dyn KeyPairGenerator>,
    config: Arc<ProvisionerConfig>,
    events: EventLog,
}

impl Provisioner {
    /// Creates a provisioner.
    ///
    /// `host` runs commands on the hypervisor host itself (disk import,
    /// image download); `connector` opens executors for cluster nodes.
    #[must_use]
    pub fn new(
        hypervisor: Arc<dyn Hypervisor>,
        host: Arc<dyn RemoteExecutor>,
        connector: Arc<dyn RemoteConnector>,
        store: Arc<dyn ClusterStore>,
        keys: Arc<dyn KeyPairGenerator>,
        config: ProvisionerConfig,
        events: EventLog,
    ) -> Self {
        Self {
            hypervisor,
            host,
            connector,
            store,
            keys,
            config: Arc::new(config),
            events,
        }
    }

    /// Event log every session is written to.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Runs every stage enabled in `request`.
    pub async fn create_cluster(&self, request: ProvisionRequest) -> Result<()> {
        let span = tracing::info_span!("create_cluster", cluster = %request.cluster.cluster_name);
        self.provision(request).instrument(span).await
    }

    async fn provision(&self, request: ProvisionRequest) -> Result<()> {
        let ProvisionRequest { stages, mut cluster } = request;
        tracing::info!(nodes = cluster.nodes.len(), ?stages, "Provisioning cluster");

        self.run_stage(Stage::KeyBootstrap, self.ensure_key_pair(&mut cluster))
            .await?;

        if stages.create_virtual_machines {
            self.run_stage(Stage::CreateVirtualMachines, self.create_virtual_machines(&cluster))
                .await?;
            self.run_stage(Stage::StartVirtualMachines, self.start_virtual_machines(&cluster))
                .await?;
            self.run_stage(Stage::UpdateVmsOs, self.update_vms_os(&cluster))
                .await?;
            self.run_stage(Stage::ShutdownVirtualMachines, self.shutdown_virtual_machines(&cluster))
                .await?;
            self.run_stage(Stage::StartVirtualMachines, self.start_virtual_machines(&cluster))
                .await?;
        }
        if stages.setup_virtual_machines {
            self.run_stage(Stage::SetupVirtualMachines, self.setup_virtual_machines(&cluster))
                .await?;
        }
        if stages.install_kubernetes {
            self.run_stage(Stage::InstallKubernetes, self.install_kubernetes(&cluster))
                .await?;
        }
        if stages.join_nodes_to_cluster {
            self.run_stage(Stage::JoinNodesToCluster, self.join_nodes_to_cluster(&cluster))
                .await?;
        }
        if stages.fetches_kube_config() {
            self.run_stage(Stage::FetchKubeConfig, self.fetch_kube_config(&cluster))
                .await?;
        }
        if stages.install_addons {
            self.run_stage(Stage::InstallAddons, self.install_addons(&cluster))
                .await?;
        }
        if stages.install_helm_apps {
            self.run_stage(Stage::InstallHelmApps, self.install_helm_apps(&cluster))
                .await?;
        }
        if stages.install_k8s_resources {
            self.run_stage(Stage::InstallK8sResources, self.install_k8s_resources(&cluster))
                .await?;
        }

        tracing::info!("Cluster provisioned");
        Ok(())
    }

    async fn run_stage<F>(&self, stage: Stage, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let timer = StageTimer::start(stage.as_str());
        match work.await {
            Ok(()) => {
                timer.finish();
                Ok(())
            }
            Err(e) => {
                timer.fail(&e);
                Err(e)
            }
        }
    }

    /// Runs `work` inside a session named `name`.
    async fn observe<T, F>(&self, name: String, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let session = self.events.start(name);
        session.finish(work.await)
    }

    /// Runs `work` once per node and waits for all of them.
    ///
    /// Every node runs to completion even when a sibling fails; the first
    /// error in completion order is returned.
    async fn for_each_node<F, Fut>(&self, cluster: &Cluster, work: F) -> Result<()>
    where
        F: Fn(Self, Arc<Cluster>, KubernetesNode) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let shared = Arc::new(cluster.clone());
        let mut executor = TaskExecutor::new();
        for node in &cluster.nodes {
            let unit = work(self.clone(), shared.clone(), node.clone());
            executor.add_task(move || unit);
        }

        executor.wait().await.into_result().map(|_| ())
    }

    /// Opens an executor on `node`.
    async fn node_executor(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<Arc<dyn RemoteExecutor>> {
        self.connector
            .connect(&node.ip_address, &cluster.node_username, &cluster.ssh_key)
            .await
    }

    /// Connects to `node` and runs `command` there, returning its stdout.
    ///
    /// Connecting happens inside the caller's session, so a refused
    /// connection is reported like any other failed command.
    async fn run_on(&self, cluster: &Cluster, node: &KubernetesNode, command: &str) -> Result<String> {
        let executor = self.node_executor(cluster, node).await?;
        output(executor.as_ref(), command).await
    }

    async fn ensure_key_pair(&self, cluster: &mut Cluster) -> Result<()> {
        if !cluster.ssh_key.is_empty() {
            return Ok(());
        }

        let session = self.events.start("Generate SSH key pair");
        let generated = self.generate_and_store_key(cluster).await;
        session.finish(generated)
    }

    async fn generate_and_store_key(&self, cluster: &mut Cluster) -> Result<()> {
        cluster.ssh_key = self.keys.generate(&cluster.cluster_name).await?;
        self.store.save_cluster(cluster).await?;
        Ok(())
    }
}

/// Runs `command` and returns its stdout.
async fn output(executor: &dyn RemoteExecutor, command: &str) -> Result<String> {
    Ok(executor.run(command).await?)
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("node", &self.hypervisor.node_name())
            .field("host", &self.host.host())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
