//! Global CLI configuration.
//!
//! The config root resolves, highest priority first, from:
//! 1. Explicit `--root` flag
//! 2. `GOCY_DEFAULT_ROOT` environment variable
//! 3. `~/.gocy`
//!
//! The active constellation comes from `--constellation`, then `<root>/ccontext`
//! (written by `gocy use`), then the default `jupiter`.

use std::path::PathBuf;

use clap::Args;

use gocy_common::{Cluster, Constellation, Workspace};
use gocy_metal::{CpemConfig, MetalClient, RecordStore, DEFAULT_API_URL};

use crate::{Error, Result};

/// Flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config root holding constellation files and secrets
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Constellation to act on instead of the active one
    #[arg(long, short = 'c', global = true)]
    pub constellation: Option<String>,

    /// Provider API token
    #[arg(long, env = "METAL_AUTH_TOKEN", global = true, hide_env_values = true)]
    pub metal_auth_token: Option<String>,

    /// Provider project id
    #[arg(long, env = "METAL_PROJECT_ID", global = true)]
    pub metal_project_id: Option<String>,

    /// Provider API base URL
    #[arg(long, env = "METAL_API_URL", global = true, default_value = DEFAULT_API_URL)]
    pub metal_api_url: String,
}

impl GlobalArgs {
    /// Workspace for the resolved root and constellation
    pub fn workspace(&self) -> Result<Workspace> {
        Ok(Workspace::discover(
            self.root.as_deref(),
            self.constellation.as_deref(),
        )?)
    }

    /// Workspace plus its loaded constellation
    pub fn load(&self) -> Result<(Workspace, Constellation)> {
        let workspace = self.workspace()?;
        let constellation = workspace.load_constellation()?;
        Ok((workspace, constellation))
    }

    /// Provider credentials as (token, project id)
    pub fn metal_credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .metal_auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::validation("METAL_AUTH_TOKEN is not set"))?;
        let project = self
            .metal_project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::validation("METAL_PROJECT_ID is not set"))?;
        Ok((token, project))
    }

    /// Provider API client
    pub fn metal_client(&self) -> Result<MetalClient> {
        let (token, project) = self.metal_credentials()?;
        Ok(MetalClient::new(&self.metal_api_url, project, token)?)
    }

    /// CPEM credentials for the configured project
    pub fn cpem_config(&self) -> Result<CpemConfig> {
        let (token, project) = self.metal_credentials()?;
        Ok(CpemConfig::new(token, project))
    }
}

/// Look up a cluster of the constellation by name
pub fn find_cluster<'a>(constellation: &'a Constellation, name: &str) -> Result<&'a Cluster> {
    Ok(constellation.require_cluster(name)?)
}

/// Record store of a workspace
pub fn record_store(workspace: &Workspace) -> RecordStore {
    RecordStore::new(workspace.clone())
}
