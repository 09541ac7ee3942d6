//! `gocy register-vips`: reserve every VIP the constellation declares.
//!
//! The provider inventory is fetched once, saved to `<secrets>/project-ips.yaml`
//! for inspection, and used as the snapshot for every decision of the run.

use clap::Args;
use tracing::info;

use gocy_common::{Constellation, Workspace};
use gocy_metal::{MetalApi, ReconcileContext, ReservationEngine, VipOutcome};

use crate::commands::init_dirs::init_dirs;
use crate::config::record_store;
use crate::{GlobalArgs, Result};

/// Reserve every VIP the constellation declares
#[derive(Args, Debug)]
pub struct RegisterVipsArgs {}

/// Run the register-vips command.
pub async fn run(global: &GlobalArgs, _args: RegisterVipsArgs) -> Result<()> {
    let (workspace, constellation) = global.load()?;
    let client = global.metal_client()?;

    let outcomes = register(&client, &workspace, &constellation).await?;
    print_summary(&outcomes);
    Ok(())
}

/// Reconcile every (cluster, VIP) pair of the constellation
pub async fn register<A: MetalApi + ?Sized>(
    api: &A,
    workspace: &Workspace,
    constellation: &Constellation,
) -> Result<Vec<VipOutcome>> {
    init_dirs(workspace, constellation)?;
    let store = record_store(workspace);

    let inventory = api.list_ips().await?;
    store.save_inventory(&inventory)?;

    let mut ctx = ReconcileContext::with_inventory(inventory);
    let outcomes = ReservationEngine::new(api, store)
        .reconcile_constellation(&mut ctx, constellation)
        .await?;

    info!(
        vips = outcomes.len(),
        requests = ctx.requests_issued(),
        "VIP reconciliation finished"
    );
    Ok(outcomes)
}

fn print_summary(outcomes: &[VipOutcome]) {
    println!(
        "{:<16} {:<8} {:<12} {:<14} ADDRESSES",
        "CLUSTER", "ROLE", "TYPE", "SOURCE"
    );
    for outcome in outcomes {
        println!(
            "{:<16} {:<8} {:<12} {:<14} {}",
            outcome.cluster,
            outcome.role,
            outcome.vip_type,
            outcome.source,
            outcome.addresses.all().collect::<Vec<_>>().join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{self, MockMetal};
    use gocy_common::VipRole;
    use gocy_metal::{IpReservation, Source};

    fn granted(ip_type: &str, address: &str, tags: &[String]) -> IpReservation {
        IpReservation {
            ip_type: ip_type.to_string(),
            address: Some(address.to_string()),
            cidr: Some(32),
            tags: tags.to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let (_dir, workspace) = test_support::workspace();
        let constellation = workspace.load_constellation().unwrap();

        let mut api = MockMetal::new();
        api.expect_list_ips().times(2).returning(|| Ok(vec![]));
        // jupiter/cp, jupiter/ingress (global), io/cp; io/ingress reuses the global
        api.expect_request_ips().times(3).returning(|req| {
            let address = match (req.ip_type.as_str(), req.metro.as_deref()) {
                ("global_ipv4", _) => "147.75.40.1",
                (_, Some("fr")) => "147.75.80.4",
                _ => "147.75.90.4",
            };
            Ok(vec![granted(&req.ip_type, address, &req.tags)])
        });

        let first = register(&api, &workspace, &constellation).await.unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first[3].source, Source::SharedGlobal);
        assert!(workspace.inventory_snapshot_path().exists());

        let second = register(&api, &workspace, &constellation).await.unwrap();
        assert!(second.iter().all(|o| o.source == Source::Record));
        assert_eq!(
            second.iter().map(|o| &o.addresses).collect::<Vec<_>>(),
            first.iter().map(|o| &o.addresses).collect::<Vec<_>>()
        );

        let store = record_store(&workspace);
        assert_eq!(store.control_plane_vip("io").unwrap(), "147.75.90.4");
        assert_eq!(
            store.load_addresses("io", VipRole::Ingress).unwrap().global_ipv4,
            vec!["147.75.40.1"]
        );
    }

    #[tokio::test]
    async fn inventory_failure_stops_before_reserving() {
        let (_dir, workspace) = test_support::workspace();
        let constellation = workspace.load_constellation().unwrap();

        let mut api = MockMetal::new();
        api.expect_list_ips().returning(|| {
            Err(gocy_common::Error::provider("projects/p/ips", "401 Unauthorized"))
        });
        api.expect_request_ips().never();

        assert!(register(&api, &workspace, &constellation).await.is_err());
        assert!(!workspace.inventory_snapshot_path().exists());
    }
}
