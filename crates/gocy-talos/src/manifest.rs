//! Static manifest materialization
//!
//! A cluster manifest generated by `clusterctl` carries Talos config templates
//! whose `configPatches` are applied at provisioning time. Materializing it runs
//! those patches through `talosctl` up front, validates the result, and embeds
//! the finished machine configs so nothing is generated at boot.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use gocy_common::{fs, Error, Result};

use crate::talosctl::ConfigTool;

/// First line Talos expects on machine configs passed as user data
pub const TALOS_HASHBANG: &str = "#!talos";

const CONFIG_PATCHES: &str = "configPatches";
const GENERATE_TYPE: &str = "generateType";
const DATA: &str = "data";

/// Machine role of a Talos config template
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MachineRole {
    /// `TalosControlPlane`
    ControlPlane,
    /// `TalosConfigTemplate`
    Worker,
}

impl MachineRole {
    /// Both roles, control plane first
    pub const ALL: [MachineRole; 2] = [MachineRole::ControlPlane, MachineRole::Worker];

    /// Manifest kind carrying this role's template
    pub fn kind(self) -> &'static str {
        match self {
            Self::ControlPlane => "TalosControlPlane",
            Self::Worker => "TalosConfigTemplate",
        }
    }

    /// Path from the document root to the mapping holding `configPatches`
    fn section_path(self) -> &'static [&'static str] {
        match self {
            Self::ControlPlane => &["spec", "controlPlaneConfig", "controlplane"],
            Self::Worker => &["spec", "template", "spec"],
        }
    }

    /// Base config written by `talosctl gen config`
    pub fn base_config(self) -> &'static str {
        match self {
            Self::ControlPlane => "controlplane.yaml",
            Self::Worker => "worker.yaml",
        }
    }

    /// Extracted patch list
    pub fn patches_file(self) -> &'static str {
        match self {
            Self::ControlPlane => "controlplane-patches.yaml",
            Self::Worker => "worker-patches.yaml",
        }
    }

    /// Patched, validated machine config
    pub fn output_file(self) -> &'static str {
        match self {
            Self::ControlPlane => "controlplane-capi.yaml",
            Self::Worker => "worker-capi.yaml",
        }
    }
}

impl std::fmt::Display for MachineRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Prefix a machine config with the Talos marker line, once
pub fn add_hashbang(config: &str) -> String {
    if config.starts_with(TALOS_HASHBANG) {
        config.to_string()
    } else {
        format!("{}\n{}", TALOS_HASHBANG, config)
    }
}

/// A multi-document cluster manifest.
///
/// Documents keep their original order. A document that is never rewritten is
/// emitted with its original text.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterManifest {
    source: String,
    documents: Vec<Value>,
    /// Original text of each document; `None` once the document was rewritten
    texts: Vec<Option<String>>,
}

impl ClusterManifest {
    /// Parse every document; `source` names the manifest in errors
    pub fn parse(content: &str, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut documents = Vec::new();
        let mut texts = Vec::new();
        for text in split_documents(content) {
            let value = if has_content(&text) {
                serde_yaml::from_str(&text)
                    .map_err(|e| Error::validation(&source, e.to_string()))?
            } else {
                Value::Null
            };
            documents.push(value);
            texts.push(Some(text));
        }
        Ok(Self {
            source,
            documents,
            texts,
        })
    }

    /// Read and parse a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?, path.display().to_string())
    }

    /// Documents in file order
    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    fn position(&self, role: MachineRole) -> Result<usize> {
        let mut found = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.get("kind").and_then(Value::as_str) == Some(role.kind()))
            .map(|(i, _)| i);

        match (found.next(), found.next()) {
            (Some(i), None) => Ok(i),
            (None, _) => Err(Error::validation(
                &self.source,
                format!("no {} document", role.kind()),
            )),
            (Some(_), Some(_)) => Err(Error::validation(
                &self.source,
                format!("more than one {} document", role.kind()),
            )),
        }
    }

    fn section(&self, role: MachineRole) -> Result<&Mapping> {
        let mut node = &self.documents[self.position(role)?];
        for key in role.section_path() {
            node = node.get(*key).ok_or_else(|| self.missing(role, *key))?;
        }
        node.as_mapping()
            .ok_or_else(|| self.missing(role, "mapping"))
    }

    fn section_mut(&mut self, role: MachineRole) -> Result<&mut Mapping> {
        let index = self.position(role)?;
        let source = self.source.clone();
        let missing = |key: &str| {
            Error::validation(
                &source,
                format!("{} has no {}", role.kind(), section_description(role, key)),
            )
        };

        let mut node = &mut self.documents[index];
        for key in role.section_path() {
            node = node.get_mut(*key).ok_or_else(|| missing(*key))?;
        }
        node.as_mapping_mut().ok_or_else(|| missing("mapping"))
    }

    fn missing(&self, role: MachineRole, key: &str) -> Error {
        Error::validation(
            &self.source,
            format!("{} has no {}", role.kind(), section_description(role, key)),
        )
    }

    /// The ordered patch list of a role's template
    pub fn config_patches(&self, role: MachineRole) -> Result<&Vec<Value>> {
        self.section(role)?
            .get(CONFIG_PATCHES)
            .and_then(Value::as_sequence)
            .ok_or_else(|| self.missing(role, CONFIG_PATCHES))
    }

    /// Replace a role's patch list with a literal machine config
    pub fn embed(&mut self, role: MachineRole, config: String) -> Result<()> {
        let index = self.position(role)?;
        let section = self.section_mut(role)?;
        section.shift_remove(CONFIG_PATCHES);
        section.insert(GENERATE_TYPE.into(), "none".into());
        section.insert(DATA.into(), Value::String(config));
        self.texts[index] = None;
        Ok(())
    }

    /// Render every document, separated by `---`.
    ///
    /// Rewritten documents are serialized; the rest keep their original text.
    pub fn to_yaml(&self) -> Result<String> {
        let mut rendered = Vec::with_capacity(self.documents.len());
        for (value, text) in self.documents.iter().zip(&self.texts) {
            match text {
                Some(text) if text.ends_with('\n') => rendered.push(text.clone()),
                Some(text) => rendered.push(format!("{}\n", text)),
                None => rendered.push(serde_yaml::to_string(value)?),
            }
        }
        Ok(rendered.join("---\n"))
    }
}

/// Split a YAML stream at its `---` markers into the raw text of each document.
///
/// Anything after a marker on the same line starts the next document. Empty
/// documents are dropped.
fn split_documents(content: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();
    for line in content.split_inclusive('\n') {
        let bare = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if bare == "---" || bare.starts_with("--- ") {
            documents.push(std::mem::take(&mut current));
            let rest = bare["---".len()..].trim_start();
            if !rest.is_empty() {
                current.push_str(rest);
                current.push('\n');
            }
        } else {
            current.push_str(line);
        }
    }
    documents.push(current);
    documents.retain(|text| !text.trim().is_empty());
    documents
}

/// Whether a document holds anything besides comments and blank lines
fn has_content(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    })
}

fn section_description(role: MachineRole, key: &str) -> String {
    format!("{} (under {})", key, role.section_path().join("."))
}

/// Runs the patch, validate and embed steps for one cluster
pub struct PatchPipeline<'a, T: ConfigTool + ?Sized> {
    tool: &'a T,
}

impl<'a, T: ConfigTool + ?Sized> PatchPipeline<'a, T> {
    /// Pipeline driving `tool`
    pub fn new(tool: &'a T) -> Self {
        Self { tool }
    }

    /// Materialize `manifest_path` into `output_path`.
    ///
    /// Base configs are read from and intermediate files written to `work_dir`.
    /// Nothing is written to `output_path` unless both machine configs validate.
    pub async fn materialize(
        &self,
        cluster: &str,
        work_dir: &Path,
        manifest_path: &Path,
        output_path: &Path,
    ) -> Result<ClusterManifest> {
        let mut manifest = ClusterManifest::load(manifest_path)?;

        for role in MachineRole::ALL {
            let patches = manifest.config_patches(role)?;
            debug!(cluster, %role, patches = patches.len(), "Extracted config patches");
            fs::write_yaml(&work_dir.join(role.patches_file()), patches)?;
        }

        let mut configs = Vec::with_capacity(MachineRole::ALL.len());
        for role in MachineRole::ALL {
            let config = self.render(cluster, work_dir, role).await?;
            configs.push((role, config));
        }

        for (role, config) in configs {
            manifest.embed(role, config)?;
        }

        fs::write_atomic(output_path, manifest.to_yaml()?.as_bytes())?;
        info!(cluster, path = %output_path.display(), "Wrote static manifest");
        Ok(manifest)
    }

    async fn render(&self, cluster: &str, work_dir: &Path, role: MachineRole) -> Result<String> {
        let base = work_dir.join(role.base_config());
        let patches = work_dir.join(role.patches_file());
        let output: PathBuf = work_dir.join(role.output_file());

        let config = add_hashbang(&self.tool.patch(&base, &patches).await?);
        fs::write_atomic(&output, config.as_bytes())?;

        self.tool
            .validate(&output)
            .await
            .map_err(|e| Error::validation_failure(cluster, &output, e.to_string()))?;

        debug!(cluster, %role, path = %output.display(), "Machine config validated");
        Ok(config)
    }
}
