//! `gocy bootstrap`: point talosctl at the cluster's machines and bootstrap it.
//!
//! Devices are discovered from the provider: a device belongs to the cluster
//! when its hostname contains the cluster name, and is a control-plane machine
//! when its hostname contains `control-plane`. Their public IPv4 addresses are
//! written into the cluster's talosconfig before etcd is bootstrapped on the
//! first control-plane machine and the admin kubeconfig is fetched through the
//! control-plane VIP.

use clap::Args;
use tracing::info;

use gocy_common::{VipRole, Workspace};
use gocy_metal::devices::{cluster_machines, talos_targets};
use gocy_metal::MetalApi;
use gocy_talos::{ConfigTool, TalosConfig, Talosctl};

use crate::config::{find_cluster, record_store};
use crate::{GlobalArgs, Result};

/// Bootstrap a cluster whose machines are provisioned
#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Cluster to bootstrap
    #[arg(long)]
    pub cluster: String,
}

/// Run the bootstrap command.
pub async fn run(global: &GlobalArgs, args: BootstrapArgs) -> Result<()> {
    let (workspace, constellation) = global.load()?;
    find_cluster(&constellation, &args.cluster)?;
    let client = global.metal_client()?;

    bootstrap(&client, &Talosctl::new(), &workspace, &args.cluster).await?;
    println!(
        "Wrote {}",
        workspace.kubeconfig_path(&args.cluster).display()
    );
    Ok(())
}

/// Record node targets, bootstrap etcd and fetch the kubeconfig
pub async fn bootstrap<A, T>(api: &A, tool: &T, workspace: &Workspace, cluster: &str) -> Result<()>
where
    A: MetalApi + ?Sized,
    T: ConfigTool + ?Sized,
{
    let devices = api.list_devices().await?;
    let machines = cluster_machines(&devices, cluster);
    let (nodes, endpoints) = talos_targets(&machines, cluster)?;
    let first_control_plane = endpoints.first().cloned().ok_or_else(|| {
        gocy_common::Error::inventory_mismatch(
            cluster,
            VipRole::Cp,
            "no control-plane device among the cluster's machines",
        )
    })?;

    let talosconfig_path = workspace.talosconfig_path(cluster);
    let mut talosconfig = TalosConfig::load(&talosconfig_path)?;
    talosconfig.set_targets(cluster, nodes, endpoints)?;
    talosconfig.save(&talosconfig_path)?;
    info!(cluster, path = %talosconfig_path.display(), "Recorded node targets");

    tool.bootstrap(&talosconfig_path, &first_control_plane)
        .await?;

    let vip = record_store(workspace).control_plane_vip(cluster)?;
    tool.kubeconfig(&talosconfig_path, &vip, &workspace.kubeconfig_path(cluster))
        .await?;
    info!(cluster, node = %first_control_plane, "Cluster bootstrapped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{self, MockMetal, MockTool};
    use gocy_metal::types::{Device, DeviceAddress};
    use std::path::Path;

    const TALOSCONFIG: &str = r#"context: io
contexts:
  io:
    endpoints:
    - 147.75.90.4
    ca: Y2E=
    crt: Y3J0
    key: a2V5
"#;

    fn device(hostname: &str, address: &str) -> Device {
        Device {
            id: hostname.to_string(),
            hostname: hostname.to_string(),
            ip_addresses: vec![DeviceAddress {
                address: address.to_string(),
                address_family: 4,
                public: true,
            }],
        }
    }

    #[tokio::test]
    async fn records_targets_then_bootstraps() {
        let (_dir, workspace) = test_support::workspace();
        test_support::with_cp_vip(&workspace, "io", "147.75.90.4");
        std::fs::write(workspace.talosconfig_path("io"), TALOSCONFIG).unwrap();

        let mut api = MockMetal::new();
        api.expect_list_devices().returning(|| {
            Ok(vec![
                device("io-control-plane-a", "147.75.2.1"),
                device("io-worker-b", "147.75.2.2"),
                device("jupiter-control-plane-c", "147.75.1.1"),
            ])
        });

        let mut tool = MockTool::new();
        let mut seq = mockall::Sequence::new();
        tool.expect_bootstrap()
            .withf(|_, node| node == "147.75.2.1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let kubeconfig = workspace.kubeconfig_path("io");
        tool.expect_kubeconfig()
            .withf(move |_, node, out: &Path| node == "147.75.90.4" && out == kubeconfig)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        bootstrap(&api, &tool, &workspace, "io").await.unwrap();

        let talosconfig = TalosConfig::load(&workspace.talosconfig_path("io")).unwrap();
        let context = talosconfig.context("io").unwrap();
        assert_eq!(context.nodes, vec!["147.75.2.1", "147.75.2.2"]);
        assert_eq!(context.endpoints, vec!["147.75.2.1"]);
        assert!(context.extra.contains_key("ca"));
    }

    #[tokio::test]
    async fn no_devices_is_an_inventory_mismatch() {
        let (_dir, workspace) = test_support::workspace();

        let mut api = MockMetal::new();
        api.expect_list_devices().returning(|| Ok(vec![]));
        let mut tool = MockTool::new();
        tool.expect_bootstrap().never();

        let err = bootstrap(&api, &tool, &workspace, "io").await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Gocy(gocy_common::Error::InventoryMismatch { .. })
        ));
    }
}
