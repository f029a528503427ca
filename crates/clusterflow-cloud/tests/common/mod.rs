//! Scripted fake cloud shared by the integration suites
#![allow(dead_code)]

use async_trait::async_trait;
use clusterflow_cloud::{
    CloudError, InterruptMonitor, Resource, ResourceGraph, ResourceKind, ResourceState,
    ResourceStatus, Result,
};
use clusterflow_core::{Cluster, PoolRole, ServerPool, Tags};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// One recorded call against the fake cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Actual(String),
    Expected(String),
    Apply(String),
    Delete(String),
    Tag(String),
}

/// Shared fake cloud account: which resources are live plus a call journal
#[derive(Debug, Default)]
pub struct FakeCloud {
    journal: Mutex<Vec<Call>>,
    live: Mutex<BTreeSet<(ResourceKind, String)>>,
    delete_attempts: Mutex<Vec<(String, Instant)>>,
    creations: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: Call) {
        self.journal.lock().unwrap().push(call);
    }

    /// Mark a resource as already existing
    pub fn create(&self, kind: ResourceKind, name: &str) {
        self.live.lock().unwrap().insert((kind, name.to_string()));
    }

    pub fn is_live(&self, kind: ResourceKind, name: &str) -> bool {
        self.live.lock().unwrap().contains(&(kind, name.to_string()))
    }

    /// Names of live resources, sorted
    pub fn live(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .live
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Resources `apply` had to create rather than adopt, in order
    pub fn created(&self) -> Vec<String> {
        self.creations.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }

    pub fn applies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Apply(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn tagged(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Tag(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Instants of every delete attempt against `name`
    pub fn delete_instants(&self, name: &str) -> Vec<Instant> {
        self.delete_attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, at)| *at)
            .collect()
    }
}

/// Key under which a fake resource records its identifier in the cluster
pub fn identifier_tag(kind: ResourceKind, name: &str) -> String {
    format!("fake.clusterflow.io/{}/{}", kind, name)
}

/// Scripted resource backed by a [`FakeCloud`]
pub struct FakeResource {
    cloud: Arc<FakeCloud>,
    kind: ResourceKind,
    name: String,
    fail_apply: bool,
    fail_actual: bool,
    fatal_delete: bool,
    transient_deletes: AtomicU32,
    interrupt_after_apply: Option<InterruptMonitor>,
    lookup_tag: Option<String>,
}

impl FakeResource {
    pub fn new(cloud: &Arc<FakeCloud>, kind: ResourceKind, name: &str) -> Self {
        Self {
            cloud: Arc::clone(cloud),
            kind,
            name: name.to_string(),
            fail_apply: false,
            fail_actual: false,
            fatal_delete: false,
            transient_deletes: AtomicU32::new(0),
            interrupt_after_apply: None,
            lookup_tag: None,
        }
    }

    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn failing_actual(mut self) -> Self {
        self.fail_actual = true;
        self
    }

    pub fn fatal_delete(mut self) -> Self {
        self.fatal_delete = true;
        self
    }

    /// Fail the next `count` deletes with a retryable error
    pub fn transient_deletes(self, count: u32) -> Self {
        self.transient_deletes.store(count, Ordering::SeqCst);
        self
    }

    /// Deliver an interrupt to `monitor` right after a successful apply
    pub fn interrupting(mut self, monitor: &InterruptMonitor) -> Self {
        self.interrupt_after_apply = Some(monitor.clone());
        self
    }

    /// Only findable through a parent identifier recorded under `tag`, the
    /// way a subnet is looked up by its network id
    pub fn found_through(mut self, tag: impl Into<String>) -> Self {
        self.lookup_tag = Some(tag.into());
        self
    }

    fn identifier(&self) -> String {
        format!("{}-{}", self.kind, self.name)
    }
}

#[async_trait]
impl Resource for FakeResource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn actual(&self, known: &Cluster) -> Result<(Cluster, ResourceState)> {
        self.cloud.record(Call::Actual(self.name.clone()));
        if self.fail_actual {
            return Err(CloudError::ApiError(format!("cannot describe {}", self.name)));
        }
        if !self.cloud.is_live(self.kind, &self.name) {
            return Err(CloudError::ResourceNotFound(self.identifier()));
        }
        if let Some(tag) = &self.lookup_tag {
            if !known.tags.contains_key(tag) {
                return Err(CloudError::ResourceNotFound(format!(
                    "{} (no {} in cluster)",
                    self.identifier(),
                    tag
                )));
            }
        }

        let state = ResourceState::new(self.kind, &self.name)
            .with_identifier(self.identifier())
            .with_status(ResourceStatus::Running);
        let cluster = self.render(&state, known)?;
        Ok((cluster, state))
    }

    async fn expected(&self, known: &Cluster) -> Result<(Cluster, ResourceState)> {
        self.cloud.record(Call::Expected(self.name.clone()));
        let state = ResourceState::new(self.kind, &self.name).with_status(ResourceStatus::Running);
        Ok((known.clone(), state))
    }

    async fn apply(
        &self,
        actual: &ResourceState,
        expected: &ResourceState,
        applied: &Cluster,
    ) -> Result<(Cluster, ResourceState)> {
        self.cloud.record(Call::Apply(self.name.clone()));
        if self.fail_apply {
            return Err(CloudError::ApiError(format!(
                "InsufficientCapacity: cannot create {}",
                self.name
            )));
        }

        let created = if actual.exists() {
            actual.clone()
        } else {
            self.cloud.create(self.kind, &self.name);
            self.cloud.creations.lock().unwrap().push(self.name.clone());
            expected.clone().with_identifier(self.identifier())
        };

        if let Some(monitor) = &self.interrupt_after_apply {
            monitor.request_abort();
        }

        let cluster = self.render(&created, applied)?;
        Ok((cluster, created))
    }

    async fn delete(&self, _actual: &ResourceState, known: &Cluster) -> Result<Cluster> {
        self.cloud.record(Call::Delete(self.name.clone()));
        self.cloud
            .delete_attempts
            .lock()
            .unwrap()
            .push((self.name.clone(), Instant::now()));

        let pending = self.transient_deletes.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_deletes.store(pending - 1, Ordering::SeqCst);
            return Err(CloudError::from_api_message(format!(
                "DependencyViolation: {} has dependent objects",
                self.identifier()
            )));
        }
        if self.fatal_delete {
            return Err(CloudError::from_api_message(format!(
                "UnauthorizedOperation: not allowed to delete {}",
                self.identifier()
            )));
        }

        self.cloud
            .live
            .lock()
            .unwrap()
            .remove(&(self.kind, self.name.clone()));
        let mut cluster = known.clone();
        cluster.tags.remove(&identifier_tag(self.kind, &self.name));
        Ok(cluster)
    }

    fn render(&self, rendered: &ResourceState, known: &Cluster) -> Result<Cluster> {
        let mut cluster = known.clone();
        if let Some(identifier) = &rendered.identifier {
            cluster
                .tags
                .insert(identifier_tag(self.kind, &self.name), identifier.clone());
        }
        Ok(cluster)
    }

    fn tag(&mut self, _tags: &Tags) -> Result<()> {
        self.cloud.record(Call::Tag(self.name.clone()));
        Ok(())
    }
}

/// Graph of plain fake resources, one per (kind, name)
pub fn graph(cloud: &Arc<FakeCloud>, resources: &[(ResourceKind, &str)]) -> ResourceGraph {
    resources
        .iter()
        .fold(ResourceGraph::new(), |graph, (kind, name)| {
            graph.with(FakeResource::new(cloud, *kind, name))
        })
}

/// Empty observed cluster
pub fn observed() -> Cluster {
    Cluster::new("demo", "fake", "local")
}

/// Declared cluster that differs from [`observed`]
pub fn declared() -> Cluster {
    observed()
        .with_server_pool(ServerPool::new("master", PoolRole::Master).with_count(1, 1))
        .with_server_pool(ServerPool::new("node", PoolRole::Node).with_count(1, 3))
}
