//! Registries mapping clouds to resource and provider implementations

use crate::concurrent::CloudProvider;
use crate::error::{CloudError, Result};
use crate::model::ResourceGraph;
use crate::resource::{Resource, ResourceKind};
use clusterflow_core::{Cluster, ServerPool};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds one resource; `pool` is set for server-pool scoped kinds
pub type ResourceFactory =
    Arc<dyn Fn(&Cluster, Option<&ServerPool>) -> Result<Box<dyn Resource>> + Send + Sync>;

/// Builds the provider used by the concurrent apply engine
pub type ProviderFactory = Arc<dyn Fn(&Cluster) -> Result<Arc<dyn CloudProvider>> + Send + Sync>;

/// Resource implementations keyed by (cloud, kind)
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    factories: HashMap<(String, ResourceKind), ResourceFactory>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, cloud: impl Into<String>, kind: ResourceKind, factory: F)
    where
        F: Fn(&Cluster, Option<&ServerPool>) -> Result<Box<dyn Resource>> + Send + Sync + 'static,
    {
        self.factories
            .insert((cloud.into(), kind), Arc::new(factory));
    }

    pub fn supports(&self, cloud: &str, kind: ResourceKind) -> bool {
        self.factories.contains_key(&(cloud.to_string(), kind))
    }

    fn supports_cloud(&self, cloud: &str) -> bool {
        self.factories.keys().any(|(c, _)| c == cloud)
    }

    fn factory(&self, cloud: &str, kind: ResourceKind) -> Option<&ResourceFactory> {
        self.factories.get(&(cloud.to_string(), kind))
    }

    /// Resource graph for `cluster` in canonical dependency order
    ///
    /// Cluster-scoped prelude kinds come first, then every server pool's
    /// resources pool by pool, then the cluster-scoped epilogue. Kinds the
    /// cloud has no implementation for are left out. Cluster tags are applied
    /// to every resource.
    pub fn build_graph(&self, cluster: &Cluster) -> Result<ResourceGraph> {
        if !self.supports_cloud(&cluster.cloud) {
            return Err(CloudError::ProviderNotFound(cluster.cloud.clone()));
        }

        let mut graph = ResourceGraph::new();

        for kind in ResourceKind::PRELUDE {
            if let Some(factory) = self.factory(&cluster.cloud, kind) {
                graph.push(factory(cluster, None)?);
            }
        }

        for pool in &cluster.server_pools {
            for kind in ResourceKind::POOL {
                if let Some(factory) = self.factory(&cluster.cloud, kind) {
                    graph.push(factory(cluster, Some(pool))?);
                }
            }
        }

        for kind in ResourceKind::EPILOGUE {
            if let Some(factory) = self.factory(&cluster.cloud, kind) {
                graph.push(factory(cluster, None)?);
            }
        }

        if !cluster.tags.is_empty() {
            graph.tag(&cluster.tags)?;
        }

        tracing::debug!(
            "Built resource graph for {} ({} resources)",
            cluster.name,
            graph.len()
        );
        Ok(graph)
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .factories
            .keys()
            .map(|(cloud, kind)| format!("{}:{}", cloud, kind))
            .collect();
        keys.sort();
        f.debug_struct("ResourceRegistry")
            .field("factories", &keys)
            .finish()
    }
}

/// Provider factories keyed by cloud name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, cloud: impl Into<String>, factory: F)
    where
        F: Fn(&Cluster) -> Result<Arc<dyn CloudProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(cloud.into(), Arc::new(factory));
    }

    pub fn provider_for(&self, expected: &Cluster) -> Result<Arc<dyn CloudProvider>> {
        let factory = self
            .factories
            .get(&expected.cloud)
            .ok_or_else(|| CloudError::ProviderNotFound(expected.cloud.clone()))?;
        factory(expected)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut clouds: Vec<&String> = self.factories.keys().collect();
        clouds.sort();
        f.debug_struct("ProviderRegistry")
            .field("clouds", &clouds)
            .finish()
    }
}
