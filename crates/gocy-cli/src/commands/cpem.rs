//! `gocy cpem-config`: write the Cloud Provider for Equinix Metal Secret.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::info;

use gocy_common::{fs, Workspace};
use gocy_metal::CpemConfig;

use crate::{GlobalArgs, Result};

/// Name of the Secret CPEM reads its credentials from
pub const CPEM_SECRET_NAME: &str = "metal-cloud-config";
/// Namespace CPEM runs in
pub const CPEM_SECRET_NAMESPACE: &str = "kube-system";
/// Key of the credentials document in the Secret
pub const CPEM_SECRET_KEY: &str = "cloud-sa.json";

/// Write `<secrets>/cpem/cpem.yaml`
#[derive(Args, Debug)]
pub struct CpemConfigArgs {}

/// Run the cpem-config command.
pub fn run(global: &GlobalArgs, _args: CpemConfigArgs) -> Result<()> {
    let workspace = global.workspace()?;
    let path = write_cpem_secret(&workspace, &global.cpem_config()?)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// The CPEM Secret for a config
pub fn cpem_secret(config: &CpemConfig) -> Result<Secret> {
    let data = BTreeMap::from([(
        CPEM_SECRET_KEY.to_string(),
        ByteString(config.to_json()?.into_bytes()),
    )]);

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(CPEM_SECRET_NAME.to_string()),
            namespace: Some(CPEM_SECRET_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

/// Render the Secret into the workspace's CPEM config path
pub fn write_cpem_secret(workspace: &Workspace, config: &CpemConfig) -> Result<PathBuf> {
    let path = workspace.cpem_config_path();
    let yaml = serde_yaml::to_string(&cpem_secret(config)?)?;
    fs::write_atomic(&path, yaml.as_bytes())?;
    info!(path = %path.display(), "Wrote CPEM secret");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use serde_yaml::Value;

    #[test]
    fn secret_carries_cloud_sa_json() {
        let (_dir, workspace) = test_support::workspace();
        let config = CpemConfig::new("token", "proj");

        let path = write_cpem_secret(&workspace, &config).unwrap();
        assert!(path.ends_with("jupiter/cpem/cpem.yaml"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let doc: Value = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(doc["apiVersion"], Value::from("v1"));
        assert_eq!(doc["kind"], Value::from("Secret"));
        assert_eq!(doc["type"], Value::from("Opaque"));
        assert_eq!(doc["metadata"]["namespace"], Value::from("kube-system"));
        assert!(doc["metadata"].get("creationTimestamp").is_none());

        let secret: Secret = serde_yaml::from_str(&raw).unwrap();
        let payload = &secret.data.unwrap()[CPEM_SECRET_KEY];
        assert_eq!(payload.0, config.to_json().unwrap().into_bytes());
    }
}
