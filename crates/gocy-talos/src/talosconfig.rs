//! The `talosconfig` machine-access context

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use gocy_common::{fs, Error, Result};

/// A `talosconfig` file. Credentials and unknown keys are carried through untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TalosConfig {
    /// Active context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Contexts by name
    #[serde(default)]
    pub contexts: BTreeMap<String, TalosContext>,
    /// Remaining keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One named context: where `talosctl` connects and which nodes it targets
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TalosContext {
    /// Control-plane addresses `talosctl` connects through
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Every node of the cluster
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Certificates and remaining keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TalosConfig {
    /// Read a talosconfig file
    pub fn load(path: &Path) -> Result<Self> {
        fs::read_yaml(path)
    }

    /// Write the file back atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write_yaml(path, self)
    }

    /// Context for a cluster
    pub fn context(&self, name: &str) -> Result<&TalosContext> {
        self.contexts.get(name).ok_or_else(|| missing_context(name))
    }

    /// Replace the node and endpoint lists of a cluster's context
    pub fn set_targets(
        &mut self,
        name: &str,
        nodes: Vec<String>,
        endpoints: Vec<String>,
    ) -> Result<()> {
        let context = self
            .contexts
            .get_mut(name)
            .ok_or_else(|| missing_context(name))?;
        context.nodes = nodes;
        context.endpoints = endpoints;
        Ok(())
    }

    /// Node addresses recorded for a cluster
    pub fn recorded_nodes(&self, name: &str) -> Result<BTreeSet<String>> {
        Ok(self.context(name)?.nodes.iter().cloned().collect())
    }
}

fn missing_context(name: &str) -> Error {
    Error::validation("talosconfig", format!("no context named '{}'", name))
}
