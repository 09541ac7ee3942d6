//! `gocy generate-manifest` and `gocy build-static-manifest`.
//!
//! The first renders a cluster template with `clusterctl`; the second embeds
//! validated Talos machine configs into that manifest so nothing is generated
//! at provisioning time.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use gocy_common::{fs, CommandRunner, ExternalCommand, ProcessRunner, Workspace};
use gocy_metal::CpemConfig;
use gocy_talos::{ConfigTool, PatchPipeline, Talosctl};

use crate::commands::gen_config::ensure_base_configs;
use crate::commands::CommandErrorExt;
use crate::config::{find_cluster, record_store};
use crate::{Error, GlobalArgs, Result};

/// Template variable carrying the base64 CPEM credentials
pub const CPEM_SECRET_ENV: &str = "TOEM_CPEM_SECRET";
/// Template variable carrying the control-plane VIP
pub const CP_ENDPOINT_ENV: &str = "TOEM_CP_ENDPOINT";

/// Generate `<cluster-dir>/<cluster>.yaml` from a cluster template
#[derive(Args, Debug)]
pub struct GenerateManifestArgs {
    /// Cluster to generate the manifest for
    #[arg(long)]
    pub cluster: String,

    /// clusterctl template to render
    #[arg(long)]
    pub template: PathBuf,
}

/// Build `<cluster-dir>/<cluster>.static-config.yaml`
#[derive(Args, Debug)]
pub struct BuildStaticManifestArgs {
    /// Cluster to materialize
    #[arg(long)]
    pub cluster: String,

    /// Regenerate the Talos base configs first
    #[arg(long)]
    pub force: bool,
}

/// Run the generate-manifest command.
pub async fn run_generate(global: &GlobalArgs, args: GenerateManifestArgs) -> Result<()> {
    let (workspace, constellation) = global.load()?;
    find_cluster(&constellation, &args.cluster)?;
    let template = std::path::absolute(&args.template).cmd_err()?;
    let path = generate_manifest(
        &ProcessRunner,
        &workspace,
        &args.cluster,
        &template,
        &global.cpem_config()?,
    )
    .await?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Run the build-static-manifest command.
pub async fn run_build_static(global: &GlobalArgs, args: BuildStaticManifestArgs) -> Result<()> {
    let (workspace, constellation) = global.load()?;
    find_cluster(&constellation, &args.cluster)?;
    let path =
        build_static_manifest(&Talosctl::new(), &workspace, &args.cluster, args.force).await?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Render the cluster template and write its output atomically
pub async fn generate_manifest<R: CommandRunner + ?Sized>(
    runner: &R,
    workspace: &Workspace,
    cluster: &str,
    template: &Path,
    cpem: &CpemConfig,
) -> Result<PathBuf> {
    let vip = record_store(workspace).control_plane_vip(cluster)?;

    let command = ExternalCommand::new("clusterctl")
        .args(["generate", "cluster", cluster, "--from"])
        .arg(template.display().to_string())
        .env(CPEM_SECRET_ENV, cpem.to_base64()?)
        .env(CP_ENDPOINT_ENV, vip);
    let manifest = runner.run(&command).await?;
    if manifest.trim().is_empty() {
        return Err(Error::command_failed(format!(
            "clusterctl rendered an empty manifest for {}",
            cluster
        )));
    }

    let path = workspace.cluster_manifest_path(cluster);
    fs::write_atomic(&path, manifest.as_bytes())?;
    info!(cluster, path = %path.display(), "Wrote cluster manifest");
    Ok(path)
}

/// Materialize the generated manifest of a cluster into its static form
pub async fn build_static_manifest<T: ConfigTool + ?Sized>(
    tool: &T,
    workspace: &Workspace,
    cluster: &str,
    force: bool,
) -> Result<PathBuf> {
    let manifest = workspace.cluster_manifest_path(cluster);
    if !manifest.exists() {
        return Err(Error::command_failed(format!(
            "{} not found. Run `gocy generate-manifest --cluster {}` first.",
            manifest.display(),
            cluster
        )));
    }

    ensure_base_configs(tool, workspace, cluster, force).await?;

    let output = workspace.static_manifest_path(cluster);
    PatchPipeline::new(tool)
        .materialize(cluster, &workspace.cluster_dir(cluster), &manifest, &output)
        .await?;
    Ok(output)
}
