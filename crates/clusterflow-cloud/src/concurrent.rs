//! Concurrent apply engine
//!
//! A simpler, non-atomic alternative to the [`AtomicReconciler`](crate::AtomicReconciler)
//! for resources known to be independent of each other, such as the
//! resources of sibling server pools. Every (provider, resource) pair runs as
//! its own task; the batch fails as a whole on the first error or when the
//! global timeout fires first. Nothing is rolled back here.

use crate::error::{CloudError, ReconcileError, Result};
use crate::registry::ProviderRegistry;
use crate::resource::ResourceKind;
use async_trait::async_trait;
use clusterflow_config::ConcurrentSettings;
use clusterflow_core::{Cluster, ServerPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A resource applied by a [`CloudProvider`] in the concurrent path
pub trait CloudResource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn name(&self) -> &str;

    fn describe(&self) -> String {
        format!("{} '{}'", self.kind(), self.name())
    }
}

/// Cloud provider abstraction for the concurrent path
///
/// Constructed per cloud from the expected cluster by a factory registered in
/// a [`ProviderRegistry`].
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g. "amazon", "google")
    fn name(&self) -> &str;

    /// Resources a server pool needs, all independent of each other
    async fn expected_server_pool_resources(
        &self,
        pool: &ServerPool,
    ) -> Result<Vec<Arc<dyn CloudResource>>>;

    /// Create or update one resource
    async fn apply_resource(&self, resource: Arc<dyn CloudResource>) -> Result<()>;
}

/// One unit of concurrent work, dropped with the batch
#[derive(Clone)]
pub struct ReconcilePair {
    pub provider: Arc<dyn CloudProvider>,
    pub resource: Arc<dyn CloudResource>,
}

impl std::fmt::Debug for ReconcilePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilePair")
            .field("provider", &self.provider.name())
            .field("resource", &self.resource.describe())
            .finish()
    }
}

/// Message on the shared completion queue
#[derive(Debug)]
enum Completion {
    Applied(String),
    Failed(String, CloudError),
    TimedOut,
}

/// Applies server pool resources concurrently under one global timeout
pub struct ConcurrentApplier {
    providers: ProviderRegistry,
    timeout: Duration,
}

impl ConcurrentApplier {
    pub fn new(providers: ProviderRegistry, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn from_settings(providers: ProviderRegistry, settings: &ConcurrentSettings) -> Self {
        Self::new(providers, Duration::from_secs(settings.timeout_secs))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Apply `expected` unless it already matches `actual`
    pub async fn reconcile(
        &self,
        actual: &Cluster,
        expected: &Cluster,
    ) -> std::result::Result<Cluster, ReconcileError> {
        if actual.same_as(expected)? {
            tracing::info!("Cluster {} is up to date, skipping apply", expected.name);
            return Ok(actual.clone());
        }

        let provider =
            self.providers
                .provider_for(expected)
                .map_err(|source| ReconcileError::Provider {
                    cloud: expected.cloud.clone(),
                    source,
                })?;

        let pairs = reconcile_pairs(provider, expected).await?;
        apply_all(pairs, self.timeout).await?;
        Ok(expected.clone())
    }
}

impl std::fmt::Debug for ConcurrentApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentApplier")
            .field("providers", &self.providers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Flatten every server pool's expected resources into pairs
pub async fn reconcile_pairs(
    provider: Arc<dyn CloudProvider>,
    expected: &Cluster,
) -> std::result::Result<Vec<ReconcilePair>, ReconcileError> {
    let mut pairs = Vec::new();
    for pool in &expected.server_pools {
        let resources = provider
            .expected_server_pool_resources(pool)
            .await
            .map_err(|source| ReconcileError::Provider {
                cloud: provider.name().to_string(),
                source,
            })?;
        pairs.extend(resources.into_iter().map(|resource| ReconcilePair {
            provider: Arc::clone(&provider),
            resource,
        }));
    }
    Ok(pairs)
}

/// Run one task per pair and wait for all of them, the first error, or the
/// timeout, whichever comes first
///
/// Tasks still running when the batch fails are left to finish on their own;
/// in-flight cloud calls are never cancelled.
pub async fn apply_all(
    pairs: Vec<ReconcilePair>,
    timeout: Duration,
) -> std::result::Result<(), ReconcileError> {
    let mut remaining = pairs.len();
    if remaining == 0 {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(remaining + 1);

    for pair in pairs {
        let tx = tx.clone();
        tokio::spawn(async move {
            let label = pair.resource.describe();
            let completion = match pair.provider.apply_resource(Arc::clone(&pair.resource)).await {
                Ok(()) => Completion::Applied(label),
                Err(e) => Completion::Failed(label, e),
            };
            let _ = tx.send(completion).await;
        });
    }

    let timer = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = tx.send(Completion::TimedOut).await;
    });

    let result = loop {
        match rx.recv().await {
            Some(Completion::Applied(resource)) => {
                remaining -= 1;
                tracing::debug!("Applied {} ({} remaining)", resource, remaining);
                if remaining == 0 {
                    break Ok(());
                }
            }
            Some(Completion::Failed(resource, source)) => {
                tracing::warn!("Concurrent apply of {} failed: {}", resource, source);
                break Err(ReconcileError::ConcurrentApply { resource, source });
            }
            Some(Completion::TimedOut) => {
                tracing::warn!(
                    "Concurrent apply timed out after {:?}, {} resource(s) pending",
                    timeout,
                    remaining
                );
                break Err(ReconcileError::Timeout { timeout, remaining });
            }
            None => break Err(ReconcileError::Incomplete { remaining }),
        }
    };

    timer.abort();
    result
}
