//! Desired-state model of a constellation
//!
//! A constellation is one primary ("bary") cluster plus zero or more satellites.
//! The model is loaded once per run and never mutated afterwards.
//!
//! Example:
//! ```yaml
//! name: jupiter
//! bary:
//!   name: jupiter
//!   metro: fr
//!   domain_prefix: jup
//!   vips:
//!     - role: cp
//!       vipType: public_ipv4
//!       count: 1
//!     - role: ingress
//!       vipType: global_ipv4
//!       count: 1
//!   control_nodes:
//!     - plan: c3.small.x86
//!       count: 3
//!   worker_nodes:
//!     - plan: m3.small.x86
//!       count: 2
//! satellites: []
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{fs, Error, Result};

/// Role a VIP plays inside a cluster
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum VipRole {
    /// Control-plane API endpoint
    Cp,
    /// Ingress endpoint
    Ingress,
    /// Cluster mesh / VPN endpoint
    Mesh,
}

impl VipRole {
    /// Wire name used in tags and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cp => "cp",
            Self::Ingress => "ingress",
            Self::Mesh => "mesh",
        }
    }
}

impl std::fmt::Display for VipRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider address class of a VIP
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VipType {
    /// Public IPv4 block scoped to one metro
    PublicIpv4,
    /// Global anycast IPv4, at most one per project
    GlobalIpv4,
}

impl VipType {
    /// Provider type string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicIpv4 => "public_ipv4",
            Self::GlobalIpv4 => "global_ipv4",
        }
    }

    /// Whether the address is shared across metros
    pub fn is_global(&self) -> bool {
        matches!(self, Self::GlobalIpv4)
    }
}

impl std::fmt::Display for VipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A VIP requirement of a cluster
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct VipSpec {
    /// What the VIP is used for
    pub role: VipRole,
    /// Address class to reserve
    #[serde(rename = "vipType")]
    pub vip_type: VipType,
    /// Number of addresses
    pub count: u32,
}

/// A machine plan and how many devices of it a cluster needs
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NodePlan {
    /// Provider plan slug (e.g. `c3.small.x86`)
    pub plan: String,
    /// Number of devices
    pub count: u32,
}

/// One cluster of the constellation
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Cluster {
    /// Unique cluster name
    pub name: String,
    /// Provider metro code (e.g. `fr`)
    pub metro: String,
    /// Subdomain the cluster's services live under
    #[serde(default)]
    pub domain_prefix: String,
    /// VIP requirements, reconciled in declaration order
    #[serde(default)]
    pub vips: Vec<VipSpec>,
    /// Control-plane machine plans
    #[serde(default)]
    pub control_nodes: Vec<NodePlan>,
    /// Worker machine plans
    #[serde(default)]
    pub worker_nodes: Vec<NodePlan>,
}

impl Cluster {
    /// The VIP requirement for a role, if the cluster declares one
    pub fn vip(&self, role: VipRole) -> Option<&VipSpec> {
        self.vips.iter().find(|v| v.role == role)
    }

    /// All machine plans, control plane first
    pub fn node_plans(&self) -> impl Iterator<Item = &NodePlan> {
        self.control_nodes.iter().chain(self.worker_nodes.iter())
    }

    /// Fully qualified name of a service in this cluster.
    ///
    /// Labels are dot-joined: `["grafana", "ops"]` → `grafana.ops.<prefix>.<domain>`.
    pub fn fqdn(&self, labels: &[&str], domain: &str) -> String {
        format!("{}.{}.{}", labels.join("."), self.domain_prefix, domain)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("constellation", "cluster name must not be empty"));
        }
        if self.metro.trim().is_empty() {
            return Err(Error::validation(&self.name, "metro must not be empty"));
        }

        let mut roles = HashSet::new();
        for vip in &self.vips {
            if vip.count == 0 {
                return Err(Error::validation(
                    &self.name,
                    format!("vip '{}' must request at least one address", vip.role),
                ));
            }
            if !roles.insert(vip.role) {
                return Err(Error::validation(
                    &self.name,
                    format!("vip role '{}' declared more than once", vip.role),
                ));
            }
        }

        for plan in self.node_plans() {
            if plan.plan.trim().is_empty() {
                return Err(Error::validation(&self.name, "node plan must not be empty"));
            }
        }

        Ok(())
    }
}

/// A primary cluster and its satellites
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Constellation {
    /// Constellation name
    #[serde(default)]
    pub name: String,
    /// Primary (management) cluster
    pub bary: Cluster,
    /// Satellite clusters, in declaration order
    #[serde(default)]
    pub satellites: Vec<Cluster>,
}

impl Constellation {
    /// Parse and validate a constellation document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let constellation: Constellation = serde_yaml::from_str(content)?;
        constellation.validate()?;
        Ok(constellation)
    }

    /// Read and validate a constellation file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Yaml(source) => {
                Error::validation(path.display().to_string(), source.to_string())
            }
            other => other,
        })
    }

    /// All clusters, bary first
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        std::iter::once(&self.bary).chain(self.satellites.iter())
    }

    /// Look up a cluster by name
    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters().find(|c| c.name == name)
    }

    /// Look up a cluster by name, failing with the list of known clusters
    pub fn require_cluster(&self, name: &str) -> Result<&Cluster> {
        self.cluster(name).ok_or_else(|| {
            let known: Vec<&str> = self.clusters().map(|c| c.name.as_str()).collect();
            Error::validation(
                name,
                format!(
                    "cluster not in constellation (known: {})",
                    known.join(", ")
                ),
            )
        })
    }

    /// Check the invariants that hold across clusters
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for cluster in self.clusters() {
            cluster.validate()?;
            if !names.insert(cluster.name.as_str()) {
                return Err(Error::validation(
                    &cluster.name,
                    "cluster name is not unique within the constellation",
                ));
            }
        }
        Ok(())
    }
}
