//! `gocy verify-nodes`: check the live cluster against its talosconfig.
//!
//! Stops the run when the node addresses the cluster reports differ from the
//! node list recorded in the talosconfig, before anything acts on a stale set.

use std::path::PathBuf;

use clap::Args;
use tracing::warn;

use gocy_common::{Constellation, VipRole, Workspace};
use gocy_talos::topology::{self, ClusterNodes, NodeSource};
use gocy_talos::{KubeNodeSource, TalosConfig};

use crate::config::{find_cluster, record_store};
use crate::{Error, GlobalArgs, Result};

/// Compare live node addresses with the recorded talosconfig
#[derive(Args, Debug)]
pub struct VerifyNodesArgs {
    /// Cluster to verify (defaults to the one the kubeconfig's current context names)
    #[arg(long)]
    pub cluster: Option<String>,

    /// Kubeconfig of the cluster (defaults to `<cluster-dir>/<cluster>.kubeconfig`)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,
}

/// Run the verify-nodes command.
pub async fn run(global: &GlobalArgs, args: VerifyNodesArgs) -> Result<()> {
    let (workspace, constellation) = global.load()?;
    let (cluster, kubeconfig) = resolve_target(&workspace, &constellation, args)?;

    let source = KubeNodeSource::from_kubeconfig(&kubeconfig).await?;
    let nodes = verify_cluster(&source, &workspace, &cluster).await?;
    println!(
        "Cluster '{}' matches its talosconfig ({} control-plane, {} worker addresses).",
        cluster,
        nodes.control_plane.len(),
        nodes.machines.len()
    );
    Ok(())
}

/// Work out which cluster to verify and which kubeconfig reaches it
pub fn resolve_target(
    workspace: &Workspace,
    constellation: &Constellation,
    args: VerifyNodesArgs,
) -> Result<(String, PathBuf)> {
    match (args.cluster, args.kubeconfig) {
        (Some(cluster), kubeconfig) => {
            find_cluster(constellation, &cluster)?;
            let kubeconfig = kubeconfig.unwrap_or_else(|| workspace.kubeconfig_path(&cluster));
            Ok((cluster, kubeconfig))
        }
        (None, Some(kubeconfig)) => {
            let context = topology::current_context(&kubeconfig)?.ok_or_else(|| {
                Error::validation(format!(
                    "{} has no current context; pass --cluster",
                    kubeconfig.display()
                ))
            })?;
            let cluster = cluster_for_context(constellation, &context)?;
            Ok((cluster, kubeconfig))
        }
        (None, None) => Err(Error::validation(
            "pass --cluster or --kubeconfig to choose the cluster to verify",
        )),
    }
}

/// The constellation cluster a kubeconfig context refers to.
///
/// When several cluster names occur in the context, the longest wins.
pub fn cluster_for_context(constellation: &Constellation, context: &str) -> Result<String> {
    constellation
        .clusters()
        .filter(|c| context.contains(c.name.as_str()))
        .max_by_key(|c| c.name.len())
        .map(|c| c.name.clone())
        .ok_or_else(|| {
            Error::validation(format!(
                "kubeconfig context '{}' names no cluster of constellation '{}'",
                context, constellation.name
            ))
        })
}

/// Verify one cluster's live nodes against its recorded talosconfig
pub async fn verify_cluster<S: NodeSource + ?Sized>(
    source: &S,
    workspace: &Workspace,
    cluster: &str,
) -> Result<ClusterNodes> {
    let recorded = TalosConfig::load(&workspace.talosconfig_path(cluster))?.recorded_nodes(cluster)?;

    let addresses = workspace.address_file_path(cluster, VipRole::Cp);
    let cp_vip = if addresses.exists() {
        Some(record_store(workspace).control_plane_vip(cluster)?)
    } else {
        warn!(
            cluster,
            path = %addresses.display(),
            "No control-plane address file; comparing all addresses"
        );
        None
    };

    Ok(topology::check(source, cluster, &recorded, cp_vip.as_deref()).await?)
}
