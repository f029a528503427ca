//! Atomic reconciler
//!
//! Walks a [`Model`] in order. `reconcile` either leaves every resource in its
//! expected state or deletes, in reverse order, every resource it created in
//! the same pass before returning an error. `destroy` walks the graph
//! backwards and retries deletes that fail with a retryable error.

use crate::error::{CleanupError, CloudError, Phase, ReconcileError};
use crate::model::Model;
use crate::resource::{Resource, ResourceState};
use crate::retry::BackoffPolicy;
use crate::signal::InterruptMonitor;
use clusterflow_core::Cluster;
use std::collections::BTreeMap;

type Result<T> = std::result::Result<T, ReconcileError>;

/// Resources applied during one `reconcile` pass, keyed by graph position
///
/// Only consulted by the rollback of the same pass.
#[derive(Debug, Default)]
pub struct CreatedResources {
    applied: BTreeMap<usize, ResourceState>,
}

impl CreatedResources {
    pub fn record(&mut self, index: usize, state: ResourceState) {
        self.applied.insert(index, state);
    }

    pub fn get(&self, index: usize) -> Option<&ResourceState> {
        self.applied.get(&index)
    }

    /// Entries in graph order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, &ResourceState)> {
        self.applied.iter().map(|(index, state)| (*index, state))
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Orchestrates actual, expected, reconcile and destroy over a resource graph
pub struct AtomicReconciler<M: Model> {
    known: Cluster,
    model: M,
    interrupts: InterruptMonitor,
    backoff: BackoffPolicy,
}

impl<M: Model> AtomicReconciler<M> {
    /// Reconciler for `known` using the process-wide interrupt monitor
    pub fn new(known: Cluster, model: M) -> Self {
        Self {
            known,
            model,
            interrupts: InterruptMonitor::process(),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_interrupts(mut self, interrupts: InterruptMonitor) -> Self {
        self.interrupts = interrupts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn known(&self) -> &Cluster {
        &self.known
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Observed state of every resource, folded into one snapshot
    ///
    /// Resources reporting not found are treated as absent; any other error
    /// aborts the pass.
    pub async fn actual(&self, known: &Cluster) -> Result<Cluster> {
        self.resolve(Phase::Actual, known).await
    }

    /// Desired state of every resource, folded into one snapshot
    pub async fn expected(&self, known: &Cluster) -> Result<Cluster> {
        self.resolve(Phase::Expected, known).await
    }

    async fn resolve(&self, phase: Phase, known: &Cluster) -> Result<Cluster> {
        let _phase = self.interrupts.begin_phase();
        let mut cluster = known.defaults();

        for (index, resource) in self.model.resources().iter().enumerate() {
            let resolved = match phase {
                Phase::Actual => resource.actual(&cluster).await,
                _ => resource.expected(&cluster).await,
            };
            match resolved {
                Ok((next, _)) => cluster = next,
                // Absent resources leave the observed snapshot as it is
                Err(e) if phase == Phase::Actual && e.is_not_found() => {
                    tracing::debug!("{} does not exist yet", resource.describe());
                }
                Err(source) => {
                    return Err(ReconcileError::Resolve {
                        phase,
                        index,
                        resource: resource.describe(),
                        source,
                    });
                }
            }
        }

        tracing::debug!(
            "Resolved {} state of {} resource(s) for {}",
            phase,
            self.model.resources().len(),
            known.name
        );
        Ok(cluster)
    }

    /// Apply every resource in order, rolling back on failure
    pub async fn reconcile(&self, actual: &Cluster, expected: &Cluster) -> Result<Cluster> {
        let _phase = self.interrupts.begin_phase();

        if actual.same_as(expected)? {
            tracing::info!("Cluster {} is up to date, nothing to apply", expected.name);
            return Ok(expected.clone());
        }

        let resources = self.model.resources();
        let mut created = CreatedResources::default();
        let mut applied = expected.clone();
        // Observed snapshot as of this point in the pass, including resources
        // created or adopted so far
        let mut observed = actual.clone();

        for (index, resource) in resources.iter().enumerate() {
            let signal = self.interrupts.state();
            if signal.is_requested() {
                tracing::warn!(
                    "Reconcile of {} interrupted ({}) before {}, removing {} created resource(s)",
                    expected.name,
                    signal,
                    resource.describe(),
                    created.len()
                );
                return Err(match self.clean_up(&applied, &created).await {
                    Ok(_) => ReconcileError::Interrupted { signal, index },
                    Err(source) => ReconcileError::InterruptedCleanupFailed {
                        signal,
                        index,
                        source,
                    },
                });
            }

            let (expected_state, actual_state) =
                match self.resolve_one(resource.as_ref(), &mut observed, &applied).await {
                    Ok(states) => states,
                    Err((phase, source)) => {
                        return Err(self
                            .roll_back(phase, index, resource.as_ref(), source, &applied, &created)
                            .await);
                    }
                };

            tracing::debug!("Applying {} (index {})", resource.describe(), index);
            match resource.apply(&actual_state, &expected_state, &applied).await {
                Ok((next, state)) => {
                    applied = next;
                    let rendered = resource.render(&state, &observed);
                    created.record(index, state);
                    match rendered {
                        Ok(next) => observed = next,
                        Err(source) => {
                            return Err(self
                                .roll_back(Phase::Apply, index, resource.as_ref(), source, &applied, &created)
                                .await);
                        }
                    }
                }
                Err(source) => {
                    return Err(self
                        .roll_back(Phase::Apply, index, resource.as_ref(), source, &applied, &created)
                        .await);
                }
            }
        }

        tracing::info!(
            "Reconciled {} resource(s) for {}",
            created.len(),
            expected.name
        );
        Ok(applied)
    }

    /// Fresh read of one resource: expected against the applied snapshot,
    /// actual against the observed one, which advances with what the read
    /// found. A resource that does not exist yet resolves to an empty actual
    /// state.
    async fn resolve_one(
        &self,
        resource: &dyn Resource,
        observed: &mut Cluster,
        applied: &Cluster,
    ) -> std::result::Result<(ResourceState, ResourceState), (Phase, CloudError)> {
        let (_, expected_state) = resource
            .expected(applied)
            .await
            .map_err(|e| (Phase::Expected, e))?;
        let actual_state = match resource.actual(observed).await {
            Ok((next, state)) => {
                *observed = next;
                state
            }
            Err(e) if e.is_not_found() => ResourceState::new(resource.kind(), resource.name()),
            Err(e) => return Err((Phase::Actual, e)),
        };
        Ok((expected_state, actual_state))
    }

    async fn roll_back(
        &self,
        phase: Phase,
        index: usize,
        resource: &dyn Resource,
        failure: CloudError,
        applied: &Cluster,
        created: &CreatedResources,
    ) -> ReconcileError {
        tracing::warn!(
            "{} failed for {} (index {}): {}; removing {} created resource(s)",
            phase,
            resource.describe(),
            index,
            failure,
            created.len()
        );

        match self.clean_up(applied, created).await {
            Ok(_) => ReconcileError::RolledBack {
                phase,
                index,
                resource: resource.describe(),
                source: failure,
            },
            Err(source) => ReconcileError::CleanupFailed {
                phase,
                index,
                resource: resource.describe(),
                failure,
                source,
            },
        }
    }

    /// Delete every ledger entry, most recent first
    async fn clean_up(
        &self,
        cluster: &Cluster,
        created: &CreatedResources,
    ) -> std::result::Result<Cluster, CleanupError> {
        let resources = self.model.resources();
        let mut cluster = cluster.clone();

        for (j, state) in created.iter().rev() {
            let resource = resources[j].as_ref();
            cluster = self.delete_with_backoff(j, resource, state, &cluster).await?;
            tracing::info!("Removed {} (index {})", resource.describe(), j);
        }

        Ok(cluster)
    }

    async fn delete_with_backoff(
        &self,
        index: usize,
        resource: &dyn Resource,
        state: &ResourceState,
        cluster: &Cluster,
    ) -> std::result::Result<Cluster, CleanupError> {
        let mut backoff = self.backoff.backoff();
        loop {
            match resource.delete(state, cluster).await {
                Ok(next) => return Ok(next),
                Err(source) if source.is_retryable() && !backoff.exhausted() => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        "Retryable error removing {}: {}; retrying in {:?}",
                        resource.describe(),
                        source,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(CleanupError {
                        index,
                        resource: resource.describe(),
                        attempts: backoff.attempts() + 1,
                        source,
                    });
                }
            }
        }
    }

    /// Delete every resource, last created first
    ///
    /// Resources reported as not found are skipped. A retryable delete error
    /// retries the same resource after a backoff, until it succeeds, fails
    /// with anything else, or the policy's attempt limit is reached. Any
    /// other error stops the teardown and leaves the remaining resources
    /// untouched.
    pub async fn destroy(&self) -> Result<Cluster> {
        let _phase = self.interrupts.begin_phase();
        let resources = self.model.resources();
        let mut cluster = self.known.clone();

        for index in (0..resources.len()).rev() {
            let resource = resources[index].as_ref();
            let mut backoff = self.backoff.backoff();

            loop {
                let state = match resource.actual(&self.known).await {
                    Ok((_, state)) => state,
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("{} not found, skipping", resource.describe());
                        break;
                    }
                    Err(source) => {
                        return Err(ReconcileError::Resolve {
                            phase: Phase::Actual,
                            index,
                            resource: resource.describe(),
                            source,
                        });
                    }
                };

                match resource.delete(&state, &cluster).await {
                    Ok(next) => {
                        tracing::info!("Deleted {} (index {})", resource.describe(), index);
                        cluster = next;
                        break;
                    }
                    Err(source) if source.is_retryable() => {
                        if backoff.exhausted() {
                            return Err(ReconcileError::RetriesExhausted {
                                index,
                                resource: resource.describe(),
                                attempts: backoff.attempts(),
                                source,
                            });
                        }
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            "Retryable error deleting {}: {}; retrying in {:?}",
                            resource.describe(),
                            source,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(source) => {
                        return Err(ReconcileError::Delete {
                            index,
                            resource: resource.describe(),
                            source,
                        });
                    }
                }
            }
        }

        tracing::info!("Destroyed {} resource(s) for {}", resources.len(), self.known.name);
        Ok(cluster)
    }
}

impl<M: Model + std::fmt::Debug> std::fmt::Debug for AtomicReconciler<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicReconciler")
            .field("known", &self.known.name)
            .field("model", &self.model)
            .field("interrupts", &self.interrupts)
            .field("backoff", &self.backoff)
            .finish()
    }
}
