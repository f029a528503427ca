//! Server pools

use super::network::{Firewall, Subnet};
use serde::{Deserialize, Serialize};

/// Role of the machines in a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolRole {
    Master,
    #[default]
    Node,
}

impl std::fmt::Display for PoolRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolRole::Master => write!(f, "master"),
            PoolRole::Node => write!(f, "node"),
        }
    }
}

/// Named homogeneous group of machines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerPool {
    /// Cloud-side instance group identifier
    #[serde(default)]
    pub identifier: Option<String>,

    pub name: String,

    #[serde(default)]
    pub role: PoolRole,

    /// Machine image
    #[serde(default)]
    pub image: String,

    /// Machine size / instance type
    #[serde(default)]
    pub size: String,

    #[serde(default)]
    pub min_count: u32,

    #[serde(default)]
    pub max_count: u32,

    /// Bootstrap scripts run on first boot, in order
    #[serde(default)]
    pub bootstrap_scripts: Vec<String>,

    #[serde(default)]
    pub subnets: Vec<Subnet>,

    #[serde(default)]
    pub firewalls: Vec<Firewall>,

    #[serde(default)]
    pub instance_profile: Option<InstanceProfile>,
}

impl ServerPool {
    pub fn new(name: impl Into<String>, role: PoolRole) -> Self {
        Self {
            name: name.into(),
            role,
            ..Default::default()
        }
    }

    pub fn with_size(mut self, image: impl Into<String>, size: impl Into<String>) -> Self {
        self.image = image.into();
        self.size = size.into();
        self
    }

    pub fn with_count(mut self, min: u32, max: u32) -> Self {
        self.min_count = min;
        self.max_count = max;
        self
    }

    pub fn with_subnet(mut self, subnet: Subnet) -> Self {
        self.subnets.push(subnet);
        self
    }

    pub fn with_firewall(mut self, firewall: Firewall) -> Self {
        self.firewalls.push(firewall);
        self
    }

    pub fn is_master(&self) -> bool {
        self.role == PoolRole::Master
    }

    pub fn without_identifiers(&self) -> Self {
        Self {
            identifier: None,
            subnets: self.subnets.iter().map(Subnet::without_identifiers).collect(),
            firewalls: self
                .firewalls
                .iter()
                .map(Firewall::without_identifiers)
                .collect(),
            instance_profile: self
                .instance_profile
                .as_ref()
                .map(InstanceProfile::without_identifiers),
            ..self.clone()
        }
    }
}

/// IAM instance profile and its role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceProfile {
    #[serde(default)]
    pub identifier: Option<String>,

    pub name: String,

    pub role_name: String,

    /// Policy documents or managed policy names attached to the role
    #[serde(default)]
    pub policies: Vec<String>,
}

impl InstanceProfile {
    pub fn without_identifiers(&self) -> Self {
        Self {
            identifier: None,
            ..self.clone()
        }
    }
}
