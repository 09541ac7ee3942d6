//! Provider API documents
//!
//! Field names follow the provider's own schema. Fields gocy does not interpret
//! are kept in `extra` so reservation records round-trip the provider documents.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gocy_common::VipType;

/// Metro an address block or device lives in
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Metro {
    /// Short metro code (e.g. `fr`, `am`)
    pub code: String,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An IP reservation or assignment as reported by the provider
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct IpReservation {
    /// Provider id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Address type (`public_ipv4`, `global_ipv4`, `private_ipv4`, ...)
    #[serde(rename = "type")]
    pub ip_type: String,

    /// First address of the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Network address of the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Prefix length of the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<u8>,

    /// Whether the provider flags this as a global address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_ip: Option<bool>,

    /// Metro membership; absent for global addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro: Option<Metro>,

    /// Free-form tags; the only identity gocy can match on
    #[serde(default)]
    pub tags: Vec<String>,

    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identity of a reservation across runs: its type and normalized tag set
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct IdentityKey {
    /// Address type
    pub ip_type: String,
    /// Tags, order-independent and deduplicated
    pub tags: BTreeSet<String>,
}

impl IpReservation {
    /// Whether the provider type equals the wanted VIP type
    pub fn is_type(&self, vip_type: VipType) -> bool {
        self.ip_type == vip_type.as_str()
    }

    /// Metro code, if the reservation is metro-scoped
    pub fn metro_code(&self) -> Option<&str> {
        self.metro.as_ref().map(|m| m.code.as_str())
    }

    /// Tags as a normalized set
    pub fn tag_set(&self) -> BTreeSet<String> {
        self.tags.iter().cloned().collect()
    }

    /// (type, sorted tag set) identity used for inventory matching
    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            ip_type: self.ip_type.clone(),
            tags: self.tag_set(),
        }
    }

    /// Number of addresses the block covers
    pub fn quantity(&self) -> u64 {
        match self.cidr {
            Some(prefix) if prefix <= 32 => 1u64 << (32 - u32::from(prefix)),
            _ => 1,
        }
    }
}

/// Body of a reservation request
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct IpRequest {
    /// Address type
    #[serde(rename = "type")]
    pub ip_type: String,
    /// Number of addresses
    pub quantity: u32,
    /// Metro for metro-scoped types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,
    /// Tags identifying the reservation on later runs
    pub tags: Vec<String>,
    /// Fail instead of queueing when the request needs manual approval
    pub fail_on_approval_required: bool,
}

impl IpRequest {
    /// Request a metro-scoped public block
    pub fn public(quantity: u32, metro: &str, tags: Vec<String>) -> Self {
        Self {
            ip_type: VipType::PublicIpv4.as_str().to_string(),
            quantity,
            metro: Some(metro.to_string()),
            tags,
            fail_on_approval_required: true,
        }
    }

    /// Request a global anycast address
    pub fn global(quantity: u32, tags: Vec<String>) -> Self {
        Self {
            ip_type: VipType::GlobalIpv4.as_str().to_string(),
            quantity,
            metro: None,
            tags,
            fail_on_approval_required: true,
        }
    }
}

/// An address assigned to a device
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct DeviceAddress {
    /// The address
    pub address: String,
    /// 4 or 6
    pub address_family: u8,
    /// Publicly routable
    #[serde(default)]
    pub public: bool,
}

/// A provisioned device
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Device {
    /// Provider id
    #[serde(default)]
    pub id: String,
    /// Hostname chosen at provisioning time
    pub hostname: String,
    /// Assigned addresses
    #[serde(default)]
    pub ip_addresses: Vec<DeviceAddress>,
}

/// One line of a capacity query or its answer
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CapacityServer {
    /// Metro code
    pub metro: String,
    /// Machine plan slug
    pub plan: String,
    /// Number of devices, as a decimal string per the provider schema
    pub quantity: String,
    /// Filled in by the provider in answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY_ENTRY: &str = r#"
id: 8a3c
type: public_ipv4
address: 147.75.80.4
network: 147.75.80.4
cidr: 30
netmask: 255.255.255.252
public: true
global_ip: false
metro:
  code: fr
  name: Frankfurt
tags:
  - gocy:vip:mesh
  - gocy:cluster:io
"#;

    #[test]
    fn unknown_fields_survive_round_trip() {
        let ip: IpReservation = serde_yaml::from_str(INVENTORY_ENTRY).unwrap();
        assert_eq!(ip.metro_code(), Some("fr"));
        assert_eq!(ip.extra.get("netmask").and_then(Value::as_str), Some("255.255.255.252"));

        let yaml = serde_yaml::to_string(&ip).unwrap();
        let back: IpReservation = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, ip);
    }

    #[test]
    fn identity_ignores_tag_order() {
        let a: IpReservation = serde_yaml::from_str(INVENTORY_ENTRY).unwrap();
        let mut b = a.clone();
        b.tags.reverse();
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn quantity_follows_prefix() {
        let mut ip: IpReservation = serde_yaml::from_str(INVENTORY_ENTRY).unwrap();
        assert_eq!(ip.quantity(), 4);
        ip.cidr = Some(32);
        assert_eq!(ip.quantity(), 1);
        ip.cidr = None;
        assert_eq!(ip.quantity(), 1);
    }

    #[test]
    fn request_bodies_match_provider_schema() {
        let public = serde_json::to_value(IpRequest::public(1, "fr", vec!["t".into()])).unwrap();
        assert_eq!(public["type"], "public_ipv4");
        assert_eq!(public["metro"], "fr");
        assert_eq!(public["fail_on_approval_required"], true);

        let global = serde_json::to_value(IpRequest::global(1, vec![])).unwrap();
        assert_eq!(global["type"], "global_ipv4");
        assert!(global.get("metro").is_none());
    }
}
