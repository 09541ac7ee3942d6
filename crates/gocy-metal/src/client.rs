//! Provider API client
//!
//! [`MetalApi`] is the seam the reservation engine talks through; [`MetalClient`]
//! is the HTTP implementation against the Equinix Metal API. Calls are made one
//! at a time and never retried.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gocy_common::{Error, Result};

use crate::types::{CapacityServer, Device, IpRequest, IpReservation};

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api.equinix.com/metal/v1";

const AUTH_HEADER: &str = "X-Auth-Token";
const DEVICE_PAGE_SIZE: u32 = 1000;

/// Operations gocy needs from the provider
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetalApi: Send + Sync {
    /// List every IP reservation and assignment in the project
    async fn list_ips(&self) -> Result<Vec<IpReservation>>;

    /// Request a new reservation
    async fn request_ips(&self, request: &IpRequest) -> Result<Vec<IpReservation>>;

    /// List devices in the project
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Ask whether the given (metro, plan, quantity) lines can be provisioned
    async fn check_capacity(&self, servers: &[CapacityServer]) -> Result<Vec<CapacityServer>>;
}

#[derive(Deserialize)]
struct IpList {
    #[serde(default)]
    ip_addresses: Vec<IpReservation>,
}

#[derive(Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Serialize, Deserialize)]
struct CapacityBody {
    servers: Vec<CapacityServer>,
}

/// HTTP client for one provider project
pub struct MetalClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    token: String,
}

impl std::fmt::Debug for MetalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetalClient")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl MetalClient {
    /// Create a client for `project_id` authenticated with `token`
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gocy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::provider("client", e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            token: token.into(),
        })
    }

    fn project_path(&self, suffix: &str) -> String {
        format!("projects/{}/{}", self.project_id, suffix)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%method, path, "Calling provider API");

        let mut request = self
            .http
            .request(method, &url)
            .header(AUTH_HEADER, &self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(path, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::provider(path, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::provider(path, describe_failure(status, &text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::provider(path, format!("unexpected response body: {}", e)))
    }
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    }
}

#[async_trait]
impl MetalApi for MetalClient {
    async fn list_ips(&self) -> Result<Vec<IpReservation>> {
        let list: IpList = self
            .send::<(), _>(Method::GET, &self.project_path("ips"), None)
            .await?;
        info!(count = list.ip_addresses.len(), "Fetched project IP inventory");
        Ok(list.ip_addresses)
    }

    async fn request_ips(&self, request: &IpRequest) -> Result<Vec<IpReservation>> {
        info!(
            ip_type = %request.ip_type,
            quantity = request.quantity,
            metro = request.metro.as_deref().unwrap_or("-"),
            tags = %request.tags.join(","),
            "Requesting IP reservation"
        );
        let reservation: IpReservation = self
            .send(Method::POST, &self.project_path("ips"), Some(request))
            .await?;
        Ok(vec![reservation])
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        let path = self.project_path(&format!("devices?per_page={}", DEVICE_PAGE_SIZE));
        let list: DeviceList = self.send::<(), _>(Method::GET, &path, None).await?;
        Ok(list.devices)
    }

    async fn check_capacity(&self, servers: &[CapacityServer]) -> Result<Vec<CapacityServer>> {
        let body = CapacityBody {
            servers: servers.to_vec(),
        };
        let answer: CapacityBody = self
            .send(Method::POST, "capacity/metros", Some(&body))
            .await?;
        Ok(answer.servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let client = MetalClient::new(DEFAULT_API_URL, "proj", "secret-token").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("proj"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = MetalClient::new("http://localhost:8080/metal/v1/", "p1", "t").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/metal/v1");
        assert_eq!(client.project_path("ips"), "projects/p1/ips");
    }

    #[test]
    fn failure_description_includes_body() {
        assert_eq!(
            describe_failure(StatusCode::UNPROCESSABLE_ENTITY, " {\"errors\":[\"quota\"]} "),
            "422 Unprocessable Entity: {\"errors\":[\"quota\"]}"
        );
        assert_eq!(describe_failure(StatusCode::FORBIDDEN, ""), "403 Forbidden");
    }

    #[test]
    fn ip_list_parses_provider_wrapper() {
        let body = r#"{"ip_addresses":[{"type":"global_ipv4","address":"147.75.40.1","cidr":32,"global_ip":true,"tags":[]}]}"#;
        let list: IpList = serde_json::from_str(body).unwrap();
        assert_eq!(list.ip_addresses.len(), 1);
        assert!(list.ip_addresses[0].metro.is_none());
    }

    #[test]
    fn capacity_body_shape() {
        let body = CapacityBody {
            servers: vec![CapacityServer {
                metro: "fr".into(),
                plan: "c3.small.x86".into(),
                quantity: "3".into(),
                available: None,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["servers"][0]["quantity"], "3");
        assert!(json["servers"][0].get("available").is_none());
    }
}
