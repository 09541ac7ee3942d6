//! Expansion of reservations into concrete address lists
//!
//! The provider describes a reservation as a block (`network`/`cidr`). The
//! per-role address file lists every address of every block, grouped by type.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use gocy_common::{Error, Result, VipType};

use crate::types::IpReservation;

/// Contents of an `ip-<role>-addresses.yaml` file
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReservedVips {
    /// Metro-scoped public addresses
    #[serde(default)]
    pub public_ipv4: Vec<String>,
    /// Global anycast addresses
    #[serde(default)]
    pub global_ipv4: Vec<String>,
}

impl ReservedVips {
    /// Expand every reservation and group the addresses by type
    pub fn from_reservations(reservations: &[IpReservation]) -> Result<Self> {
        let mut vips = Self::default();
        for reservation in reservations {
            let addresses = expand(reservation)?
                .into_iter()
                .map(|a| a.to_string());
            if reservation.is_type(VipType::GlobalIpv4) {
                vips.global_ipv4.extend(addresses);
            } else {
                vips.public_ipv4.extend(addresses);
            }
        }
        Ok(vips)
    }

    /// The address a control-plane endpoint should use, public first
    pub fn endpoint(&self) -> Option<&str> {
        self.public_ipv4
            .first()
            .or_else(|| self.global_ipv4.first())
            .map(String::as_str)
    }

    /// Whether both lists are empty
    pub fn is_empty(&self) -> bool {
        self.public_ipv4.is_empty() && self.global_ipv4.is_empty()
    }

    /// All addresses, public first
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.public_ipv4
            .iter()
            .chain(self.global_ipv4.iter())
            .map(String::as_str)
    }
}

/// Expand a reservation into every address of its block.
///
/// A reservation without a prefix length is a single address.
pub fn expand(reservation: &IpReservation) -> Result<Vec<Ipv4Addr>> {
    let base = reservation
        .network
        .as_deref()
        .or(reservation.address.as_deref())
        .ok_or_else(|| {
            Error::validation(
                describe(reservation),
                "reservation carries neither network nor address",
            )
        })?;

    let base: Ipv4Addr = base.parse().map_err(|e| {
        Error::validation(
            describe(reservation),
            format!("'{}' is not an IPv4 address: {}", base, e),
        )
    })?;

    let Some(prefix) = reservation.cidr else {
        return Ok(vec![base]);
    };

    let network = Ipv4Network::new(base, prefix).map_err(|e| {
        Error::validation(
            describe(reservation),
            format!("invalid block {}/{}: {}", base, prefix, e),
        )
    })?;
    Ok(network.iter().collect())
}

fn describe(reservation: &IpReservation) -> String {
    match &reservation.id {
        Some(id) => format!("reservation {}", id),
        None => format!("{} reservation", reservation.ip_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn block(ip_type: &str, network: &str, cidr: Option<u8>) -> IpReservation {
        IpReservation {
            ip_type: ip_type.to_string(),
            network: Some(network.to_string()),
            address: Some(network.to_string()),
            cidr,
            ..Default::default()
        }
    }

    #[test]
    fn block_expands_to_exactly_its_size() {
        let reservation = block("public_ipv4", "147.75.80.4", Some(30));
        let addresses = expand(&reservation).unwrap();

        assert_eq!(addresses.len() as u64, reservation.quantity());
        let distinct: HashSet<_> = addresses.iter().collect();
        assert_eq!(distinct.len(), 4);

        let net: Ipv4Network = "147.75.80.4/30".parse().unwrap();
        assert!(addresses.iter().all(|a| net.contains(*a)));
        assert_eq!(addresses[0], Ipv4Addr::new(147, 75, 80, 4));
        assert_eq!(addresses[3], Ipv4Addr::new(147, 75, 80, 7));
    }

    #[test]
    fn single_address_without_prefix() {
        let mut reservation = block("global_ipv4", "147.75.40.1", None);
        reservation.network = None;
        assert_eq!(expand(&reservation).unwrap(), vec![Ipv4Addr::new(147, 75, 40, 1)]);
    }

    #[test]
    fn slash_32_is_one_address() {
        let reservation = block("public_ipv4", "147.75.80.9", Some(32));
        assert_eq!(expand(&reservation).unwrap().len(), 1);
    }

    #[test]
    fn missing_address_is_rejected() {
        let reservation = IpReservation {
            id: Some("abc".into()),
            ip_type: "public_ipv4".into(),
            ..Default::default()
        };
        let err = expand(&reservation).unwrap_err();
        assert!(err.to_string().contains("reservation abc"));
    }

    #[test]
    fn bad_prefix_is_rejected() {
        assert!(expand(&block("public_ipv4", "10.0.0.0", Some(40))).is_err());
        assert!(expand(&block("public_ipv4", "not-an-ip", Some(32))).is_err());
    }

    #[test]
    fn groups_addresses_by_type() {
        let vips = ReservedVips::from_reservations(&[
            block("public_ipv4", "147.75.80.4", Some(31)),
            block("global_ipv4", "147.75.40.1", Some(32)),
        ])
        .unwrap();

        assert_eq!(vips.public_ipv4, vec!["147.75.80.4", "147.75.80.5"]);
        assert_eq!(vips.global_ipv4, vec!["147.75.40.1"]);
        assert_eq!(vips.endpoint(), Some("147.75.80.4"));
        assert_eq!(vips.all().count(), 3);
    }

    #[test]
    fn endpoint_falls_back_to_global() {
        let vips = ReservedVips {
            public_ipv4: vec![],
            global_ipv4: vec!["147.75.40.1".into()],
        };
        assert_eq!(vips.endpoint(), Some("147.75.40.1"));
        assert!(ReservedVips::default().endpoint().is_none());
        assert!(ReservedVips::default().is_empty());
    }
}
