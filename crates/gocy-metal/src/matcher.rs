//! Inventory matching
//!
//! The provider has no key that survives across runs, so a reservation is
//! recognised by its exact tag set and type (and metro, for metro-scoped types).

use gocy_common::{Cluster, VipRole, VipSpec};

use crate::types::{IdentityKey, IpReservation};

/// Tag prefix the Cluster API Packet provider puts on the control-plane VIP it reserves
pub const CAPP_CLUSTER_TAG: &str = "cluster-api-provider-packet:cluster-id";

/// Tag scope naming the VIP role
pub const VIP_TAG_SCOPE: &str = "gocy:vip";

/// Tag scope naming the owning cluster
pub const CLUSTER_TAG_SCOPE: &str = "gocy:cluster";

/// Tags a reservation for `role` in `cluster` carries.
///
/// The control-plane VIP reuses the tag of the reservation CAPP makes on its own,
/// so that reservation is adopted instead of duplicated.
pub fn vip_tags(role: VipRole, cluster: &Cluster) -> Vec<String> {
    match role {
        VipRole::Cp => vec![format!("{}:{}", CAPP_CLUSTER_TAG, cluster.name)],
        VipRole::Ingress | VipRole::Mesh => vec![
            format!("{}:{}", VIP_TAG_SCOPE, role),
            format!("{}:{}", CLUSTER_TAG_SCOPE, cluster.name),
        ],
    }
}

/// The (type, tag set) identity a reservation for `wanted` in `cluster` carries
pub fn expected_identity(wanted: &VipSpec, cluster: &Cluster) -> IdentityKey {
    IdentityKey {
        ip_type: wanted.vip_type.as_str().to_string(),
        tags: vip_tags(wanted.role, cluster).into_iter().collect(),
    }
}

/// Whether an inventory entry is the reservation `wanted` describes for `cluster`
pub fn matches(entry: &IpReservation, wanted: &VipSpec, cluster: &Cluster) -> bool {
    entry.identity() == expected_identity(wanted, cluster)
        && (wanted.vip_type.is_global() || entry.metro_code() == Some(cluster.metro.as_str()))
}

/// Every inventory entry matching `wanted`, in inventory order
pub fn find<'a>(
    inventory: &'a [IpReservation],
    wanted: &VipSpec,
    cluster: &Cluster,
) -> Vec<&'a IpReservation> {
    inventory
        .iter()
        .filter(|entry| matches(entry, wanted, cluster))
        .collect()
}

/// First inventory entry matching `wanted`; scanning stops at the first hit
pub fn find_first<'a>(
    inventory: &'a [IpReservation],
    wanted: &VipSpec,
    cluster: &Cluster,
) -> Option<&'a IpReservation> {
    inventory.iter().find(|entry| matches(entry, wanted, cluster))
}
