//! Process-local state store

use super::{ClusterStorer, Result};
use crate::error::StoreError;
use async_trait::async_trait;
use clusterflow_core::Cluster;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store; clones and [`MemoryStore::scoped`] share the backing map
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    clusters: Arc<RwLock<BTreeMap<String, Cluster>>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clusters: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Store for another cluster name over the same backing map
    pub fn scoped(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clusters: Arc::clone(&self.clusters),
        }
    }
}

#[async_trait]
impl ClusterStorer for MemoryStore {
    async fn exists(&self) -> bool {
        self.clusters.read().await.contains_key(&self.name)
    }

    async fn commit(&self, cluster: &Cluster) -> Result<()> {
        if cluster.name != self.name {
            return Err(StoreError::NameMismatch {
                store: self.name.clone(),
                cluster: cluster.name.clone(),
            });
        }
        self.clusters
            .write()
            .await
            .insert(self.name.clone(), cluster.clone());
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.clusters.write().await.remove(&self.name);
        Ok(())
    }

    async fn get_cluster(&self) -> Result<Cluster> {
        self.clusters
            .read()
            .await
            .get(&self.name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(self.name.clone()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.clusters.read().await.keys().cloned().collect())
    }
}
