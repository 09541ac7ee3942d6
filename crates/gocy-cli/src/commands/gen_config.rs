//! `gocy gen-config`: generate Talos base configs for a cluster.

use clap::Args;
use tracing::info;

use gocy_common::{control_plane_url, fs, Workspace};
use gocy_talos::{ConfigTool, MachineRole, Talosctl};

use crate::config::{find_cluster, record_store};
use crate::{GlobalArgs, Result};

/// Generate `controlplane.yaml`, `worker.yaml` and `talosconfig`
#[derive(Args, Debug)]
pub struct GenConfigArgs {
    /// Cluster to generate configs for
    #[arg(long)]
    pub cluster: String,

    /// Regenerate even if the configs already exist
    #[arg(long)]
    pub force: bool,
}

/// Run the gen-config command.
pub async fn run(global: &GlobalArgs, args: GenConfigArgs) -> Result<()> {
    let (workspace, constellation) = global.load()?;
    find_cluster(&constellation, &args.cluster)?;
    ensure_base_configs(&Talosctl::new(), &workspace, &args.cluster, args.force).await?;
    Ok(())
}

/// Generate base configs against the cluster's control-plane VIP.
///
/// Returns whether `talosctl gen config` ran.
pub async fn ensure_base_configs<T: ConfigTool + ?Sized>(
    tool: &T,
    workspace: &Workspace,
    cluster: &str,
    force: bool,
) -> Result<bool> {
    let dir = workspace.cluster_dir(cluster);
    let present = MachineRole::ALL
        .iter()
        .all(|role| dir.join(role.base_config()).exists())
        && workspace.talosconfig_path(cluster).exists();

    if present && !force {
        info!(cluster, "Talos base configs present, skipping generation");
        return Ok(false);
    }

    let vip = record_store(workspace).control_plane_vip(cluster)?;
    fs::create_dir_all(&dir)?;
    tool.generate(cluster, &control_plane_url(&vip), &dir, force)
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{self, MockTool};
    use std::path::Path;

    #[tokio::test]
    async fn generates_against_the_cp_vip() {
        let (_dir, workspace) = test_support::workspace();
        test_support::with_cp_vip(&workspace, "io", "147.75.90.4");
        let expected_dir = workspace.cluster_dir("io");

        let mut tool = MockTool::new();
        tool.expect_generate()
            .withf(move |cluster, endpoint, out_dir: &Path, force| {
                cluster == "io"
                    && endpoint == "https://147.75.90.4:6443"
                    && out_dir == expected_dir
                    && !*force
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        assert!(ensure_base_configs(&tool, &workspace, "io", false).await.unwrap());
    }

    #[tokio::test]
    async fn existing_configs_are_kept_unless_forced() {
        let (_dir, workspace) = test_support::workspace();
        test_support::with_cp_vip(&workspace, "io", "147.75.90.4");
        let dir = workspace.cluster_dir("io");
        for file in ["controlplane.yaml", "worker.yaml", "talosconfig"] {
            std::fs::write(dir.join(file), "").unwrap();
        }

        let mut tool = MockTool::new();
        tool.expect_generate()
            .withf(|_, _, _, force| *force)
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        assert!(!ensure_base_configs(&tool, &workspace, "io", false).await.unwrap());
        assert!(ensure_base_configs(&tool, &workspace, "io", true).await.unwrap());
    }

    #[tokio::test]
    async fn missing_vip_is_reported() {
        let (_dir, workspace) = test_support::workspace();
        let mut tool = MockTool::new();
        tool.expect_generate().never();

        let err = ensure_base_configs(&tool, &workspace, "io", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("register-vips"));
    }
}
