//! Reservation records and address files on disk

use tracing::debug;

use gocy_common::{fs, Error, Result, VipRole, Workspace};

use crate::addresses::ReservedVips;
use crate::types::IpReservation;

/// Reads and writes the per-(cluster, role) reservation state of a workspace
#[derive(Debug, Clone)]
pub struct RecordStore {
    workspace: Workspace,
}

impl RecordStore {
    /// Store rooted in the workspace's secrets dir
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// The underlying workspace
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Load the reservation record for (cluster, role), if one was committed
    pub fn load_record(&self, cluster: &str, role: VipRole) -> Result<Option<Vec<IpReservation>>> {
        let path = self.workspace.reservation_record_path(cluster, role);
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "Loading reservation record");
        fs::read_yaml(&path).map(Some)
    }

    /// Commit a reservation record
    pub fn save_record(
        &self,
        cluster: &str,
        role: VipRole,
        reservations: &[IpReservation],
    ) -> Result<()> {
        let path = self.workspace.reservation_record_path(cluster, role);
        fs::write_yaml(&path, reservations)
    }

    /// Write the expanded address list for (cluster, role)
    pub fn save_addresses(&self, cluster: &str, role: VipRole, vips: &ReservedVips) -> Result<()> {
        let path = self.workspace.address_file_path(cluster, role);
        fs::write_yaml(&path, vips)
    }

    /// Read the expanded address list for (cluster, role)
    pub fn load_addresses(&self, cluster: &str, role: VipRole) -> Result<ReservedVips> {
        let path = self.workspace.address_file_path(cluster, role);
        if !path.exists() {
            return Err(Error::inventory_mismatch(
                cluster,
                role,
                format!("{} not found; run register-vips first", path.display()),
            ));
        }
        fs::read_yaml(&path)
    }

    /// The control-plane VIP of a cluster
    pub fn control_plane_vip(&self, cluster: &str) -> Result<String> {
        self.load_addresses(cluster, VipRole::Cp)?
            .endpoint()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::inventory_mismatch(cluster, VipRole::Cp, "address file lists no address")
            })
    }

    /// Persist the provider inventory snapshot for operators to inspect
    pub fn save_inventory(&self, inventory: &[IpReservation]) -> Result<()> {
        fs::write_yaml(&self.workspace.inventory_snapshot_path(), inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(Workspace::new(dir.path(), "jupiter"));
        (dir, store)
    }

    #[test]
    fn missing_record_is_none() {
        let (_dir, store) = store();
        assert!(store.load_record("jupiter", VipRole::Cp).unwrap().is_none());
    }

    #[test]
    fn record_round_trips() {
        let (_dir, store) = store();
        let reservation = IpReservation {
            id: Some("r1".into()),
            ip_type: "public_ipv4".into(),
            address: Some("147.75.80.4".into()),
            cidr: Some(32),
            tags: vec!["cluster-api-provider-packet:cluster-id:jupiter".into()],
            ..Default::default()
        };

        store
            .save_record("jupiter", VipRole::Cp, std::slice::from_ref(&reservation))
            .unwrap();
        let loaded = store.load_record("jupiter", VipRole::Cp).unwrap().unwrap();
        assert_eq!(loaded, vec![reservation]);
    }

    #[test]
    fn control_plane_vip_reads_address_file() {
        let (_dir, store) = store();
        store
            .save_addresses(
                "jupiter",
                VipRole::Cp,
                &ReservedVips {
                    public_ipv4: vec!["147.75.80.4".into()],
                    global_ipv4: vec![],
                },
            )
            .unwrap();
        assert_eq!(store.control_plane_vip("jupiter").unwrap(), "147.75.80.4");
    }

    #[test]
    fn control_plane_vip_missing_or_empty_is_mismatch() {
        let (_dir, store) = store();
        let err = store.control_plane_vip("jupiter").unwrap_err();
        assert!(matches!(err, Error::InventoryMismatch { .. }));

        store
            .save_addresses("jupiter", VipRole::Cp, &ReservedVips::default())
            .unwrap();
        let err = store.control_plane_vip("jupiter").unwrap_err();
        assert!(err.to_string().contains("lists no address"));
    }
}
