//! Resource abstraction: the unit of reconciliation

use crate::error::Result;
use async_trait::async_trait;
use clusterflow_core::{Cluster, Tags};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of infrastructure primitive a resource manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    KeyPair,
    Network,
    Subnet,
    Firewall,
    IamRole,
    InstanceGroup,
    LoadBalancer,
}

/// Whether a kind exists once per cluster or once per server pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cluster,
    ServerPool,
}

impl ResourceKind {
    /// Cluster-scoped kinds created before any server pool resource
    pub const PRELUDE: [ResourceKind; 2] = [ResourceKind::KeyPair, ResourceKind::Network];

    /// Per-pool kinds, in dependency order
    pub const POOL: [ResourceKind; 4] = [
        ResourceKind::Subnet,
        ResourceKind::Firewall,
        ResourceKind::IamRole,
        ResourceKind::InstanceGroup,
    ];

    /// Cluster-scoped kinds that depend on the server pools
    pub const EPILOGUE: [ResourceKind; 1] = [ResourceKind::LoadBalancer];

    pub fn scope(&self) -> Scope {
        match self {
            ResourceKind::KeyPair | ResourceKind::Network | ResourceKind::LoadBalancer => {
                Scope::Cluster
            }
            _ => Scope::ServerPool,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::KeyPair => write!(f, "key-pair"),
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Subnet => write!(f, "subnet"),
            ResourceKind::Firewall => write!(f, "firewall"),
            ResourceKind::IamRole => write!(f, "iam-role"),
            ResourceKind::InstanceGroup => write!(f, "instance-group"),
            ResourceKind::LoadBalancer => write!(f, "load-balancer"),
        }
    }
}

/// Observed or desired state of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Cloud-assigned identifier, once the resource exists
    pub identifier: Option<String>,

    pub kind: ResourceKind,

    pub name: String,

    pub status: ResourceStatus,

    /// Resource attributes (CIDR, IP, size, ...)
    pub attributes: BTreeMap<String, serde_json::Value>,

    pub tags: Tags,
}

impl ResourceState {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            identifier: None,
            kind,
            name: name.into(),
            status: ResourceStatus::Unknown,
            attributes: BTreeMap::new(),
            tags: Tags::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// True once the cloud has assigned an identifier and not removed it
    pub fn exists(&self) -> bool {
        self.identifier.is_some() && self.status != ResourceStatus::Deleted
    }
}

/// Lifecycle status the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Running,
    /// Removed on the cloud side; the identifier may still be recorded
    Deleted,
    Unknown,
}

/// A pluggable unit of cloud infrastructure
///
/// Every call is scoped to the cluster document passed in and returns the
/// document as this resource leaves it. Implementations hold no state across
/// invocations other than what they write into the cluster.
///
/// `apply` and `delete` must be idempotent: retries and re-runs call them
/// again with the same inputs.
#[async_trait]
pub trait Resource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Name unique among resources of the same kind in one graph
    fn name(&self) -> &str;

    /// Label used in logs and error messages
    fn describe(&self) -> String {
        format!("{} '{}'", self.kind(), self.name())
    }

    /// Read the current cloud state of this resource
    ///
    /// Return [`CloudError::ResourceNotFound`](crate::CloudError::ResourceNotFound)
    /// when the resource does not exist.
    async fn actual(&self, known: &Cluster) -> Result<(Cluster, ResourceState)>;

    /// Compute the desired state from the declared cluster
    async fn expected(&self, known: &Cluster) -> Result<(Cluster, ResourceState)>;

    /// Drive the cloud toward `expected`, returning the resource as created
    async fn apply(
        &self,
        actual: &ResourceState,
        expected: &ResourceState,
        applied: &Cluster,
    ) -> Result<(Cluster, ResourceState)>;

    /// Remove the cloud-side resource
    async fn delete(&self, actual: &ResourceState, known: &Cluster) -> Result<Cluster>;

    /// Fold a resource's attributes back into the cluster document
    fn render(&self, rendered: &ResourceState, known: &Cluster) -> Result<Cluster>;

    /// Apply metadata tags where the provider supports them
    fn tag(&mut self, _tags: &Tags) -> Result<()> {
        Ok(())
    }
}
