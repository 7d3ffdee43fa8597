//! Cluster persistence contract.

use crate::errors::StoreError;
use crate::model::Cluster;
use async_trait::async_trait;
use dashmap::DashMap;

/// Loads and saves cluster definitions by name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Loads the cluster named `name`.
    async fn load_cluster(&self, name: &str) -> Result<Cluster, StoreError>;

    /// Inserts or replaces a cluster, keyed by its name.
    async fn save_cluster(&self, cluster: &Cluster) -> Result<(), StoreError>;

    /// Removes the cluster named `name`.
    async fn delete_cluster(&self, name: &str) -> Result<(), StoreError>;
}

/// Process-local [`ClusterStore`].
#[derive(Debug, Default)]
pub struct InMemoryClusterStore {
    clusters: DashMap<String, Cluster>,
}

impl InMemoryClusterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Returns true if no cluster is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

#[async_trait]
impl ClusterStore for InMemoryClusterStore {
    async fn load_cluster(&self, name: &str) -> Result<Cluster, StoreError> {
        self.clusters
            .get(name)
            .map(|c| c.value().clone())
            .ok_or_else(|| StoreError::ClusterNotFound(name.to_string()))
    }

    async fn save_cluster(&self, cluster: &Cluster) -> Result<(), StoreError> {
        self.clusters
            .insert(cluster.cluster_name.clone(), cluster.clone());
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), StoreError> {
        self.clusters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::ClusterNotFound(name.to_string()))
    }
}
