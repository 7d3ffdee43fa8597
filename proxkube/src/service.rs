//! Facade used by front ends.
//!
//! [`ProvisionerService`] bundles the orchestrator with the task log read
//! model and the hypervisor inventory queries a UI needs to fill in a
//! cluster definition.

use crate::config::ProvisionerConfig;
use crate::errors::{ProvisionError, Result};
use crate::events::{EventLog, LoggingEventSink};
use crate::hypervisor::Hypervisor;
use crate::model::ProvisionRequest;
use crate::provisioner::Provisioner;
use crate::remote::{KeyPairGenerator, OpenSshConnector, RemoteConnector, RemoteExecutor, SshKeygen};
use crate::store::{ClusterStore, InMemoryClusterStore};
use crate::tasklog::{Task, TaskLogReader};
use std::sync::Arc;

/// Provisioning entry point.
#[derive(Clone)]
pub struct ProvisionerService {
    provisioner: Provisioner,
    hypervisor: Arc<dyn Hypervisor>,
    task_log: TaskLogReader<EventLog>,
}

impl ProvisionerService {
    /// Creates a service from its collaborators.
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
        let task_log = TaskLogReader::new(events.clone());
        let provisioner = Provisioner::new(hypervisor.clone(), host, connector, store, keys, config, events);
        Self {
            provisioner,
            hypervisor,
            task_log,
        }
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ProvisionerServiceBuilder {
        ProvisionerServiceBuilder::default()
    }

    /// The underlying orchestrator.
    #[must_use]
    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Prepares the hypervisor host. Returns `true` if the OS image was
    /// downloaded.
    pub async fn setup_environment(&self) -> Result<bool> {
        self.provisioner.setup_environment().await
    }

    /// Runs the stages selected in `request`.
    pub async fn create_cluster(&self, request: ProvisionRequest) -> Result<()> {
        self.provisioner.create_cluster(request).await
    }

    /// Shuts down and destroys every VM of the cluster named `name`, then
    /// removes it from the store.
    pub async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.provisioner.delete_cluster(name).await
    }

    /// Current task log, most recent first.
    #[must_use]
    pub fn get_task_log(&self) -> Vec<Task> {
        self.task_log.logs()
    }

    /// Drops every recorded event. Returns how many were dropped.
    pub fn clear_task_log(&self) -> usize {
        self.provisioner.events().clear()
    }

    /// Sorted names of storage pools able to hold VM disks.
    pub async fn storage_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .hypervisor
            .list_storage()
            .await?
            .into_iter()
            .filter(|s| s.holds_images())
            .map(|s| s.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Sorted names of the bridges on the hypervisor node.
    pub async fn network_bridge_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .hypervisor
            .list_network_bridges(self.hypervisor.node_name())
            .await?
            .into_iter()
            .map(|b| b.iface)
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Builder for [`ProvisionerService`].
///
/// The hypervisor and the hypervisor host executor are required. Other
/// collaborators default to the OpenSSH connector, `ssh-keygen`, an
/// in-memory store and an event log mirrored into `tracing`.
#[derive(Default)]
pub struct ProvisionerServiceBuilder {
    hypervisor: Option<Arc<dyn Hypervisor>>,
    host: Option<Arc<dyn RemoteExecutor>>,
    connector: Option<Arc<dyn RemoteConnector>>,
    store: Option<Arc<dyn ClusterStore>>,
    keys: Option<Arc<dyn KeyPairGenerator>>,
    config: ProvisionerConfig,
    events: Option<EventLog>,
}

impl ProvisionerServiceBuilder {
    /// Sets the hypervisor API client.
    #[must_use]
    pub fn hypervisor(mut self, hypervisor: Arc<dyn Hypervisor>) -> Self {
        self.hypervisor = Some(hypervisor);
        self
    }

    /// Sets the executor for the hypervisor host.
    #[must_use]
    pub fn host(mut self, host: Arc<dyn RemoteExecutor>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the node connector.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the cluster store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ClusterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the key pair generator.
    #[must_use]
    pub fn keys(mut self, keys: Arc<dyn KeyPairGenerator>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ProvisionerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event log.
    #[must_use]
    pub fn events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Validates the configuration and builds the service.
    pub fn build(self) -> Result<ProvisionerService> {
        self.config.validate()?;
        let hypervisor = self
            .hypervisor
            .ok_or_else(|| ProvisionError::Config("hypervisor is required".into()))?;
        let host = self
            .host
            .ok_or_else(|| ProvisionError::Config("hypervisor host executor is required".into()))?;

        let config = self.config;
        let connector = self.connector.unwrap_or_else(|| {
            Arc::new(
                OpenSshConnector::new(std::env::temp_dir().join("proxkube-keys"))
                    .with_port(config.ssh_port)
                    .with_connect_timeout(config.ssh_connect_timeout()),
            )
        });
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryClusterStore::new()));
        let keys = self
            .keys
            .unwrap_or_else(|| Arc::new(SshKeygen::default()));
        let events = self
            .events
            .unwrap_or_else(|| EventLog::default().with_sink(Arc::new(LoggingEventSink::default())));

        Ok(ProvisionerService::new(hypervisor, host, connector, store, keys, config, events))
    }
}

impl std::fmt::Debug for ProvisionerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionerService")
            .field("provisioner", &self.provisioner)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ProvisionerServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionerServiceBuilder")
            .field("has_hypervisor", &self.hypervisor.is_some())
            .field("has_host", &self.host.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
