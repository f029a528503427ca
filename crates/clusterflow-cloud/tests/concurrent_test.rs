mod common;

use async_trait::async_trait;
use clusterflow_cloud::concurrent::{apply_all, reconcile_pairs};
use clusterflow_cloud::{
    CloudError, CloudProvider, CloudResource, ConcurrentApplier, ProviderRegistry,
    ReconcileError, ResourceKind, Result,
};
use clusterflow_config::ConcurrentSettings;
use clusterflow_core::ServerPool;
use common::{declared, observed};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct PoolResource {
    kind: ResourceKind,
    name: String,
}

impl CloudResource for PoolResource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Provider whose applies take `latency`; `fail` errors, `hang` never returns
#[derive(Default)]
struct FakeProvider {
    applied: Mutex<Vec<String>>,
    latency: Duration,
    fail: Option<String>,
    hang: Option<String>,
}

impl FakeProvider {
    fn applied(&self) -> Vec<String> {
        let mut applied = self.applied.lock().unwrap().clone();
        applied.sort();
        applied
    }
}

#[async_trait]
impl CloudProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn expected_server_pool_resources(
        &self,
        pool: &ServerPool,
    ) -> Result<Vec<Arc<dyn CloudResource>>> {
        Ok([
            ResourceKind::Subnet,
            ResourceKind::Firewall,
            ResourceKind::InstanceGroup,
        ]
        .into_iter()
        .map(|kind| {
            Arc::new(PoolResource {
                kind,
                name: pool.name.clone(),
            }) as Arc<dyn CloudResource>
        })
        .collect())
    }

    async fn apply_resource(&self, resource: Arc<dyn CloudResource>) -> Result<()> {
        let label = resource.describe();
        tokio::time::sleep(self.latency).await;

        if self.hang.as_deref() == Some(label.as_str()) {
            std::future::pending::<()>().await;
        }
        if self.fail.as_deref() == Some(label.as_str()) {
            return Err(CloudError::ApiError(format!("quota exceeded for {}", label)));
        }

        self.applied.lock().unwrap().push(label);
        Ok(())
    }
}

/// Registry serving `provider` for the fake cloud, counting factory calls
fn registry(provider: &Arc<FakeProvider>, built: &Arc<AtomicUsize>) -> ProviderRegistry {
    let provider = Arc::clone(provider);
    let built = Arc::clone(built);
    let mut registry = ProviderRegistry::new();
    registry.register("fake", move |_| {
        built.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&provider) as Arc<dyn CloudProvider>)
    });
    registry
}

#[tokio::test]
async fn test_identical_clusters_skip_the_batch() {
    let provider = Arc::new(FakeProvider::default());
    let built = Arc::new(AtomicUsize::new(0));
    let applier = ConcurrentApplier::new(registry(&provider, &built), Duration::from_secs(5));

    let cluster = declared();
    let result = applier.reconcile(&cluster, &cluster).await.unwrap();

    assert_eq!(result, cluster);
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert!(provider.applied().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_every_pool_resource_is_applied() {
    let provider = Arc::new(FakeProvider {
        latency: Duration::from_millis(50),
        ..Default::default()
    });
    let built = Arc::new(AtomicUsize::new(0));
    let applier = ConcurrentApplier::new(registry(&provider, &built), Duration::from_secs(5));

    let result = applier.reconcile(&observed(), &declared()).await.unwrap();

    assert_eq!(result, declared());
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(
        provider.applied(),
        vec![
            "firewall 'master'",
            "firewall 'node'",
            "instance-group 'master'",
            "instance-group 'node'",
            "subnet 'master'",
            "subnet 'node'",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_first_error_fails_the_batch() {
    let provider = Arc::new(FakeProvider {
        fail: Some("firewall 'node'".to_string()),
        ..Default::default()
    });
    let built = Arc::new(AtomicUsize::new(0));
    let applier = ConcurrentApplier::new(registry(&provider, &built), Duration::from_secs(5));

    let err = applier
        .reconcile(&observed(), &declared())
        .await
        .unwrap_err();

    match err {
        ReconcileError::ConcurrentApply { resource, source } => {
            assert_eq!(resource, "firewall 'node'");
            assert!(source.to_string().contains("quota exceeded"));
        }
        other => panic!("Expected ConcurrentApply, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_global_timeout_fails_the_batch() {
    let provider = Arc::new(FakeProvider {
        latency: Duration::from_secs(1),
        hang: Some("instance-group 'master'".to_string()),
        ..Default::default()
    });
    let pairs = reconcile_pairs(provider.clone(), &declared()).await.unwrap();
    assert_eq!(pairs.len(), 6);

    let err = apply_all(pairs, Duration::from_secs(10)).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Timeout { remaining: 1, timeout } if timeout == Duration::from_secs(10)
    ));
    assert_eq!(provider.applied().len(), 5);
}

#[tokio::test]
async fn test_unknown_cloud_has_no_provider() {
    let provider = Arc::new(FakeProvider::default());
    let built = Arc::new(AtomicUsize::new(0));
    let applier = ConcurrentApplier::from_settings(
        registry(&provider, &built),
        &ConcurrentSettings::default(),
    );
    assert_eq!(applier.timeout(), Duration::from_secs(600));

    let mut expected = declared();
    expected.cloud = "google".to_string();

    let err = applier.reconcile(&observed(), &expected).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Provider { ref cloud, source: CloudError::ProviderNotFound(_) } if cloud == "google"
    ));
}

#[tokio::test]
async fn test_empty_batch_completes() {
    apply_all(Vec::new(), Duration::from_millis(1)).await.unwrap();
}
