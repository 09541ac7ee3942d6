//! Device discovery for a cluster

use gocy_common::{Error, Result, VipRole};

use crate::types::Device;

const CONTROL_PLANE_HOSTNAME_MARKER: &str = "control-plane";

/// Role of a machine, derived from its hostname
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceRole {
    /// Runs the control plane
    ControlPlane,
    /// Runs workloads
    Worker,
}

impl DeviceRole {
    fn from_hostname(hostname: &str) -> Self {
        if hostname.contains(CONTROL_PLANE_HOSTNAME_MARKER) {
            Self::ControlPlane
        } else {
            Self::Worker
        }
    }
}

/// Public IPv4 address of one machine of a cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterMachine {
    /// Device hostname
    pub hostname: String,
    /// Public IPv4 address
    pub address: String,
    /// Role derived from the hostname
    pub role: DeviceRole,
}

/// Machines of `cluster`, in provider order.
///
/// A device belongs to the cluster when its hostname contains the cluster name.
/// Every public IPv4 address of such a device yields one entry.
pub fn cluster_machines(devices: &[Device], cluster: &str) -> Vec<ClusterMachine> {
    devices
        .iter()
        .filter(|device| device.hostname.contains(cluster))
        .flat_map(|device| {
            let role = DeviceRole::from_hostname(&device.hostname);
            device
                .ip_addresses
                .iter()
                .filter(|ip| ip.address_family == 4 && ip.public)
                .map(move |ip| ClusterMachine {
                    hostname: device.hostname.clone(),
                    address: ip.address.clone(),
                    role,
                })
        })
        .collect()
}

/// Addresses to record in the machine-access context: (nodes, endpoints)
pub fn talos_targets(
    machines: &[ClusterMachine],
    cluster: &str,
) -> Result<(Vec<String>, Vec<String>)> {
    if machines.is_empty() {
        return Err(Error::inventory_mismatch(
            cluster,
            VipRole::Cp,
            "no provider devices found for cluster",
        ));
    }

    let mut nodes = Vec::new();
    let mut endpoints = Vec::new();
    for machine in machines {
        if !nodes.contains(&machine.address) {
            nodes.push(machine.address.clone());
        }
        if machine.role == DeviceRole::ControlPlane && !endpoints.contains(&machine.address) {
            endpoints.push(machine.address.clone());
        }
    }
    Ok((nodes, endpoints))
}
