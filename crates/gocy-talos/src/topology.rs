//! Live topology checks
//!
//! Before anything is patched or bootstrapped, the node addresses the running
//! cluster reports must equal the node list recorded in its talosconfig.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
#[cfg(test)]
use mockall::automock;
use tracing::{info, warn};

use gocy_common::{Error, Result};

/// Label marking control-plane nodes
pub const CONTROL_PLANE_ROLE_LABEL: &str = "node-role.kubernetes.io/control-plane";

const EXTERNAL_IP: &str = "ExternalIP";

/// Externally reachable node addresses, split by role
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterNodes {
    /// Control-plane node addresses
    pub control_plane: BTreeSet<String>,
    /// Worker node addresses
    pub machines: BTreeSet<String>,
}

impl ClusterNodes {
    /// Classify nodes by role label, keeping only `ExternalIP` addresses
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut result = Self::default();
        for node in nodes {
            let target = if is_control_plane_node(node) {
                &mut result.control_plane
            } else {
                &mut result.machines
            };
            target.extend(external_addresses(node));
        }
        result
    }

    /// Every address, regardless of role
    pub fn all(&self) -> BTreeSet<String> {
        self.control_plane.union(&self.machines).cloned().collect()
    }
}

/// Check if a node carries the control-plane role label
pub fn is_control_plane_node(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .map(|l| l.contains_key(CONTROL_PLANE_ROLE_LABEL))
        .unwrap_or(false)
}

fn external_addresses(node: &Node) -> impl Iterator<Item = String> + '_ {
    node.status
        .iter()
        .flat_map(|status| status.addresses.iter().flatten())
        .filter(|address| address.type_ == EXTERNAL_IP)
        .map(|address| address.address.clone())
}

/// Compare live addresses with the recorded node list.
///
/// The control-plane VIP floats between nodes and is ignored on both sides.
pub fn verify(
    cluster: &str,
    live: &ClusterNodes,
    recorded: &BTreeSet<String>,
    cp_vip: Option<&str>,
) -> Result<()> {
    let without_vip = |set: BTreeSet<String>| -> BTreeSet<String> {
        set.into_iter()
            .filter(|address| Some(address.as_str()) != cp_vip)
            .collect()
    };
    let live = without_vip(live.all());
    let recorded = without_vip(recorded.clone());

    let live_only: Vec<String> = live.difference(&recorded).cloned().collect();
    let recorded_only: Vec<String> = recorded.difference(&live).cloned().collect();

    if live_only.is_empty() && recorded_only.is_empty() {
        info!(cluster, nodes = live.len(), "Live topology matches talosconfig");
        return Ok(());
    }

    warn!(
        cluster,
        live_only = %live_only.join(","),
        recorded_only = %recorded_only.join(","),
        "Live topology drifted from talosconfig"
    );
    Err(Error::TopologyDrift {
        cluster: cluster.to_string(),
        live_only,
        recorded_only,
    })
}

/// Source of the live node list
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// List every node of the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

/// [`NodeSource`] backed by the Kubernetes API
pub struct KubeNodeSource {
    client: Client,
}

impl KubeNodeSource {
    /// Use an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with the current context of a kubeconfig file
    pub async fn from_kubeconfig(path: &Path) -> Result<Self> {
        let kubeconfig = read_kubeconfig(path)?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                Error::validation(
                    path.display().to_string(),
                    format!("failed to load kubeconfig: {}", e),
                )
            })?;
        Ok(Self::new(Client::try_from(config)?))
    }
}

#[async_trait]
impl NodeSource for KubeNodeSource {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        Ok(nodes.list(&ListParams::default()).await?.items)
    }
}

fn read_kubeconfig(path: &Path) -> Result<Kubeconfig> {
    Kubeconfig::read_from(path).map_err(|e| {
        Error::validation(
            path.display().to_string(),
            format!("failed to read kubeconfig: {}", e),
        )
    })
}

/// Current context name of a kubeconfig file
pub fn current_context(path: &Path) -> Result<Option<String>> {
    Ok(read_kubeconfig(path)?.current_context)
}

/// Discover the live nodes and verify them against the recorded list
pub async fn check<S: NodeSource + ?Sized>(
    source: &S,
    cluster: &str,
    recorded: &BTreeSet<String>,
    cp_vip: Option<&str>,
) -> Result<ClusterNodes> {
    let live = ClusterNodes::from_nodes(&source.list_nodes().await?);
    verify(cluster, &live, recorded, cp_vip)?;
    Ok(live)
}
