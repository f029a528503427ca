mod common;

use async_trait::async_trait;
use clusterflow_cloud::{
    AtomicReconciler, CloudError, CloudProvider, CloudResource, InterruptMonitor,
    ProviderRegistry, Resource, ResourceKind, ResourceRegistry,
};
use clusterflow_core::ServerPool;
use common::{FakeCloud, FakeResource, declared, observed};
use std::sync::Arc;

fn registry(cloud: &Arc<FakeCloud>) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    for kind in [
        ResourceKind::LoadBalancer,
        ResourceKind::InstanceGroup,
        ResourceKind::Subnet,
        ResourceKind::Network,
        ResourceKind::KeyPair,
    ] {
        let cloud = Arc::clone(cloud);
        registry.register("fake", kind, move |cluster, pool| {
            let name = pool.map_or(cluster.name.as_str(), |p| p.name.as_str());
            Ok(Box::new(FakeResource::new(&cloud, kind, name)) as Box<dyn Resource>)
        });
    }
    registry
}

#[test]
fn test_graph_follows_canonical_order() {
    let cloud = FakeCloud::new();
    let graph = registry(&cloud).build_graph(&declared()).unwrap();

    assert_eq!(
        graph.describe(),
        vec![
            "key-pair 'demo'",
            "network 'demo'",
            "subnet 'master'",
            "instance-group 'master'",
            "subnet 'node'",
            "instance-group 'node'",
            "load-balancer 'demo'",
        ]
    );
    assert!(cloud.tagged().is_empty());
}

#[test]
fn test_graph_tags_every_resource() {
    let cloud = FakeCloud::new();
    let cluster = declared().with_tag("team", "infra");

    let graph = registry(&cloud).build_graph(&cluster).unwrap();

    assert_eq!(cloud.tagged().len(), graph.len());
}

#[test]
fn test_unknown_cloud_is_rejected() {
    let cloud = FakeCloud::new();
    let registry = registry(&cloud);
    let mut cluster = declared();
    cluster.cloud = "azure".to_string();

    assert!(registry.supports("fake", ResourceKind::Subnet));
    assert!(!registry.supports("fake", ResourceKind::Firewall));
    assert!(matches!(
        registry.build_graph(&cluster),
        Err(CloudError::ProviderNotFound(cloud)) if cloud == "azure"
    ));
}

#[tokio::test]
async fn test_registry_graph_reconciles() {
    let cloud = FakeCloud::new();
    let graph = registry(&cloud).build_graph(&declared()).unwrap();
    let reconciler = AtomicReconciler::new(declared(), graph)
        .with_interrupts(InterruptMonitor::detached());

    let expected = reconciler.expected(&declared()).await.unwrap();
    reconciler.reconcile(&observed(), &expected).await.unwrap();

    assert_eq!(cloud.applies().len(), 7);
    assert_eq!(cloud.live().len(), 7);
}

struct NullProvider;

#[async_trait]
impl CloudProvider for NullProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn expected_server_pool_resources(
        &self,
        _pool: &ServerPool,
    ) -> clusterflow_cloud::Result<Vec<Arc<dyn CloudResource>>> {
        Ok(Vec::new())
    }

    async fn apply_resource(
        &self,
        _resource: Arc<dyn CloudResource>,
    ) -> clusterflow_cloud::Result<()> {
        Ok(())
    }
}

#[test]
fn test_provider_registry_lookup() {
    let mut providers = ProviderRegistry::new();
    providers.register("fake", |_| Ok(Arc::new(NullProvider) as Arc<dyn CloudProvider>));

    let provider = providers.provider_for(&declared()).ok().unwrap();
    assert_eq!(provider.name(), "fake");

    let mut other = declared();
    other.cloud = "google".to_string();
    assert!(matches!(
        providers.provider_for(&other),
        Err(CloudError::ProviderNotFound(_))
    ));
}
