//! Cloud Provider for Equinix Metal (CPEM) credentials

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use gocy_common::Result;

/// Contents of the CPEM `cloud-sa.json`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CpemConfig {
    /// Provider API token
    pub api_key: String,
    /// Provider project id
    #[serde(rename = "projectID")]
    pub project_id: String,
    /// Tag CPEM uses to find an elastic IP; empty disables EIP management
    pub eip_tag: String,
    /// Health-check the EIP through the node's own address
    #[serde(rename = "eipHealthCheckUseHostIP")]
    pub eip_health_check_use_host_ip: bool,
}

impl CpemConfig {
    /// Config for a project, with EIP management handed to the VIP reservations
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            eip_tag: String::new(),
            eip_health_check_use_host_ip: true,
        }
    }

    /// Serialized `cloud-sa.json`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Base64 of the JSON, as manifest templates expect it
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_json()?))
    }
}
