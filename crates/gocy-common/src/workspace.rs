//! Workspace layout under the gocy config root (`~/.gocy/` by default).
//!
//! - `<root>/ccontext`: name of the active constellation
//! - `<root>/<name>.constellation.yaml`: the constellation file
//! - `<root>/<name>/`: secrets dir for the constellation
//! - `<root>/<name>/<cluster>/`: per-cluster reservation records, address files,
//!   machine configs, talosconfig and manifests
//!
//! The root resolution chain (highest priority first):
//! 1. Explicit `--root` flag
//! 2. `GOCY_DEFAULT_ROOT` environment variable
//! 3. `~/.gocy`

use std::path::{Path, PathBuf};

use crate::{fs, Constellation, Error, Result, VipRole};

const CONFIG_DIR_NAME: &str = ".gocy";
const ROOT_ENV: &str = "GOCY_DEFAULT_ROOT";
const CONTEXT_FILE_NAME: &str = "ccontext";
const INVENTORY_FILE_NAME: &str = "project-ips.yaml";
const TALOSCONFIG_FILE_NAME: &str = "talosconfig";

/// Constellation used when no context has been selected
pub const DEFAULT_CONTEXT: &str = "jupiter";

/// Suffix of constellation files in the config root
pub const CONSTELLATION_FILE_SUFFIX: &str = ".constellation.yaml";

/// Resolve the config root from an explicit path, the environment, or the home dir
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ROOT_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let home = dirs::home_dir()
        .ok_or_else(|| Error::validation("config root", "could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Read the active constellation name from `<root>/ccontext`.
///
/// A missing or empty file falls back to [`DEFAULT_CONTEXT`].
pub fn read_context(root: &Path) -> String {
    std::fs::read_to_string(root.join(CONTEXT_FILE_NAME))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTEXT.to_string())
}

/// Resolved paths for one constellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    context: String,
}

impl Workspace {
    /// Create a workspace for an explicit root and constellation
    pub fn new(root: impl Into<PathBuf>, context: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            context: context.into(),
        }
    }

    /// Resolve root and context using the override chain
    pub fn discover(root: Option<&Path>, context: Option<&str>) -> Result<Self> {
        let root = resolve_root(root)?;
        let context = match context {
            Some(name) => name.to_string(),
            None => read_context(&root),
        };
        Ok(Self::new(root, context))
    }

    /// Config root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active constellation name
    pub fn context(&self) -> &str {
        &self.context
    }

    /// `<root>/ccontext`
    pub fn context_file(&self) -> PathBuf {
        self.root.join(CONTEXT_FILE_NAME)
    }

    /// Persist a new active constellation name
    pub fn save_context(&self, name: &str) -> Result<()> {
        fs::write_atomic(&self.context_file(), name.as_bytes())
    }

    /// `<root>/<context>.constellation.yaml`
    pub fn constellation_path(&self) -> PathBuf {
        self.constellation_path_for(&self.context)
    }

    /// Constellation file path for any name
    pub fn constellation_path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, CONSTELLATION_FILE_SUFFIX))
    }

    /// Load the active constellation
    pub fn load_constellation(&self) -> Result<Constellation> {
        Constellation::load(&self.constellation_path())
    }

    /// Names of all constellation files in the root, sorted
    pub fn available_constellations(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(|e| Error::io(&self.root, e))? {
            let entry = entry.map_err(|e| Error::io(&self.root, e))?;
            let file_name = entry.file_name();
            if let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(CONSTELLATION_FILE_SUFFIX))
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// `<root>/<context>/`
    pub fn secrets_dir(&self) -> PathBuf {
        self.root.join(&self.context)
    }

    /// Provider inventory snapshot taken by the last `register-vips`
    pub fn inventory_snapshot_path(&self) -> PathBuf {
        self.secrets_dir().join(INVENTORY_FILE_NAME)
    }

    /// `<secrets>/cpem/cpem.yaml`
    pub fn cpem_config_path(&self) -> PathBuf {
        self.secrets_dir().join("cpem").join("cpem.yaml")
    }

    /// `<secrets>/<cluster>/`
    pub fn cluster_dir(&self, cluster: &str) -> PathBuf {
        self.secrets_dir().join(cluster)
    }

    /// Cached outcome of a provider reservation for a (cluster, role)
    pub fn reservation_record_path(&self, cluster: &str, role: VipRole) -> PathBuf {
        self.cluster_dir(cluster)
            .join(format!("ip-{}-reservation.yaml", role))
    }

    /// Expanded address list for a (cluster, role)
    pub fn address_file_path(&self, cluster: &str, role: VipRole) -> PathBuf {
        self.cluster_dir(cluster)
            .join(format!("ip-{}-addresses.yaml", role))
    }

    /// Machine-access context written by `talosctl gen config`
    pub fn talosconfig_path(&self, cluster: &str) -> PathBuf {
        self.cluster_dir(cluster).join(TALOSCONFIG_FILE_NAME)
    }

    /// Admin kubeconfig fetched after bootstrap
    pub fn kubeconfig_path(&self, cluster: &str) -> PathBuf {
        self.cluster_dir(cluster)
            .join(format!("{}.kubeconfig", cluster))
    }

    /// Generated (templated) cluster manifest
    pub fn cluster_manifest_path(&self, cluster: &str) -> PathBuf {
        self.cluster_dir(cluster).join(format!("{}.yaml", cluster))
    }

    /// Static manifest with machine configs embedded
    pub fn static_manifest_path(&self, cluster: &str) -> PathBuf {
        self.cluster_dir(cluster)
            .join(format!("{}.static-config.yaml", cluster))
    }
}
