//! Cluster aggregate root

use super::network::Network;
use super::pool::ServerPool;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Current version of the cluster document layout
pub const CLUSTER_DOCUMENT_VERSION: u32 = 1;

/// Metadata tags applied to cloud resources
pub type Tags = BTreeMap<String, String>;

fn document_version() -> u32 {
    CLUSTER_DOCUMENT_VERSION
}

/// Declarative description of a target environment
///
/// The same type is used for the declared (expected) document and for the
/// observed (actual) snapshot. Maps are ordered so that two clusters with the
/// same content always serialize to the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Document layout version
    #[serde(default = "document_version")]
    pub version: u32,

    /// Cluster name, unique within a state store
    pub name: String,

    /// Cloud backend name (e.g. "amazon", "google", "baremetal")
    pub cloud: String,

    /// Region or datacenter
    #[serde(default)]
    pub location: String,

    /// Cluster network
    #[serde(default)]
    pub network: Network,

    /// Machine pools
    #[serde(default)]
    pub server_pools: Vec<ServerPool>,

    /// SSH access configuration
    #[serde(default)]
    pub ssh: SshConfig,

    /// Kubernetes API endpoint
    #[serde(default)]
    pub kubernetes_api: KubernetesApi,

    /// Tags applied to every resource that supports them
    #[serde(default)]
    pub tags: Tags,
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            version: CLUSTER_DOCUMENT_VERSION,
            name: String::new(),
            cloud: String::new(),
            location: String::new(),
            network: Network::default(),
            server_pools: Vec::new(),
            ssh: SshConfig::default(),
            kubernetes_api: KubernetesApi::default(),
            tags: Tags::new(),
        }
    }
}

impl Cluster {
    pub fn new(
        name: impl Into<String>,
        cloud: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cloud: cloud.into(),
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn with_server_pool(mut self, pool: ServerPool) -> Self {
        self.server_pools.push(pool);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Seed snapshot for a resource graph walk
    ///
    /// Keeps the declared shape of the cluster but drops every identifier the
    /// cloud assigned, so resources can fill them in from what they observe.
    pub fn defaults(&self) -> Cluster {
        Cluster {
            version: self.version,
            name: self.name.clone(),
            cloud: self.cloud.clone(),
            location: self.location.clone(),
            network: self.network.without_identifiers(),
            server_pools: self
                .server_pools
                .iter()
                .map(ServerPool::without_identifiers)
                .collect(),
            ssh: SshConfig {
                identifier: None,
                ..self.ssh.clone()
            },
            kubernetes_api: KubernetesApi {
                endpoint: None,
                load_balancer: None,
                ..self.kubernetes_api.clone()
            },
            tags: self.tags.clone(),
        }
    }

    /// Structural comparison of the serialized documents
    pub fn same_as(&self, other: &Cluster) -> Result<bool> {
        Ok(serde_json::to_vec(self)? == serde_json::to_vec(other)?)
    }

    pub fn server_pool(&self, name: &str) -> Option<&ServerPool> {
        self.server_pools.iter().find(|p| p.name == name)
    }

    pub fn server_pool_mut(&mut self, name: &str) -> Result<&mut ServerPool> {
        self.server_pools
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| CoreError::ServerPoolNotFound(name.to_string()))
    }

    /// Reject documents written by a newer release
    pub fn check_version(&self) -> Result<()> {
        if self.version > CLUSTER_DOCUMENT_VERSION {
            return Err(CoreError::UnsupportedVersion {
                found: self.version,
                supported: CLUSTER_DOCUMENT_VERSION,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.check_version()?;

        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidCluster("name must not be empty".into()));
        }
        if self.cloud.trim().is_empty() {
            return Err(CoreError::InvalidCluster(format!(
                "cluster '{}' has no cloud",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for pool in &self.server_pools {
            if !seen.insert(pool.name.as_str()) {
                return Err(CoreError::InvalidCluster(format!(
                    "duplicate server pool '{}'",
                    pool.name
                )));
            }
            if pool.min_count > pool.max_count {
                return Err(CoreError::InvalidCluster(format!(
                    "server pool '{}' has min_count {} greater than max_count {}",
                    pool.name, pool.min_count, pool.max_count
                )));
            }
        }

        tracing::debug!(
            "Validated cluster {} ({} server pools)",
            self.name,
            self.server_pools.len()
        );
        Ok(())
    }
}

/// SSH access configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Cloud-side key pair identifier
    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default)]
    pub public_key_path: Option<String>,

    #[serde(default)]
    pub public_key_fingerprint: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            identifier: None,
            user: default_ssh_user(),
            public_key_path: None,
            public_key_fingerprint: None,
            port: default_ssh_port(),
        }
    }
}

/// Kubernetes API endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubernetesApi {
    /// Address assigned once the master pool is up
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Load balancer identifier fronting the API
    #[serde(default)]
    pub load_balancer: Option<String>,
}

fn default_api_port() -> u16 {
    443
}

impl Default for KubernetesApi {
    fn default() -> Self {
        Self {
            endpoint: None,
            port: default_api_port(),
            load_balancer: None,
        }
    }
}
