//! Network topology: networks, subnets, firewalls

use serde::{Deserialize, Serialize};

/// Cluster-wide network (VPC / virtual network)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(default)]
    pub name: String,

    /// Address range, e.g. "10.0.0.0/16"
    #[serde(default)]
    pub cidr: String,
}

impl Network {
    pub fn new(name: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            identifier: None,
            name: name.into(),
            cidr: cidr.into(),
        }
    }

    pub fn without_identifiers(&self) -> Self {
        Self {
            identifier: None,
            ..self.clone()
        }
    }
}

/// Subnet attached to a server pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(default)]
    pub identifier: Option<String>,

    pub name: String,

    pub cidr: String,

    /// Availability zone
    #[serde(default)]
    pub zone: Option<String>,
}

impl Subnet {
    pub fn new(name: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            identifier: None,
            name: name.into(),
            cidr: cidr.into(),
            zone: None,
        }
    }

    pub fn without_identifiers(&self) -> Self {
        Self {
            identifier: None,
            ..self.clone()
        }
    }
}

/// Firewall (security group) attached to a server pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Firewall {
    #[serde(default)]
    pub identifier: Option<String>,

    pub name: String,

    #[serde(default)]
    pub ingress_rules: Vec<FirewallRule>,

    #[serde(default)]
    pub egress_rules: Vec<FirewallRule>,
}

impl Firewall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_ingress(mut self, rule: FirewallRule) -> Self {
        self.ingress_rules.push(rule);
        self
    }

    pub fn without_identifiers(&self) -> Self {
        Self {
            identifier: None,
            ..self.clone()
        }
    }
}

/// Single firewall rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    /// "tcp", "udp", "icmp" or "all"
    pub protocol: String,

    /// Single port ("22") or inclusive range ("30000-32767")
    #[serde(default)]
    pub ports: Option<String>,

    /// Source (ingress) or destination (egress) range
    pub cidr: String,
}

impl FirewallRule {
    pub fn tcp(ports: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            protocol: "tcp".to_string(),
            ports: Some(ports.into()),
            cidr: cidr.into(),
        }
    }
}
