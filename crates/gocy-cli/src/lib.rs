//! gocy CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use config::GlobalArgs;
pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// gocy - constellations of Talos clusters on bare metal
#[derive(Parser, Debug)]
#[command(name = "gocy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show or switch the active constellation
    Use(commands::use_constellation::UseArgs),
    /// Create the per-cluster secrets directories
    InitDirs(commands::init_dirs::InitDirsArgs),
    /// Reserve every VIP the constellation declares
    RegisterVips(commands::vips::RegisterVipsArgs),
    /// Write the CPEM cloud-config Secret
    CpemConfig(commands::cpem::CpemConfigArgs),
    /// Generate Talos base configs for a cluster
    GenConfig(commands::gen_config::GenConfigArgs),
    /// Generate a cluster manifest with clusterctl
    GenerateManifest(commands::manifest::GenerateManifestArgs),
    /// Embed validated machine configs into the cluster manifest
    BuildStaticManifest(commands::manifest::BuildStaticManifestArgs),
    /// Record node addresses, bootstrap etcd and fetch the kubeconfig
    Bootstrap(commands::bootstrap::BootstrapArgs),
    /// Check live nodes against the recorded talosconfig
    VerifyNodes(commands::verify::VerifyNodesArgs),
    /// Ask the provider whether the constellation's machines can be provisioned
    CheckCapacity(commands::capacity::CheckCapacityArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let global = self.global;
        match self.command {
            Commands::Use(args) => commands::use_constellation::run(&global, args),
            Commands::InitDirs(args) => commands::init_dirs::run(&global, args),
            Commands::RegisterVips(args) => commands::vips::run(&global, args).await,
            Commands::CpemConfig(args) => commands::cpem::run(&global, args),
            Commands::GenConfig(args) => commands::gen_config::run(&global, args).await,
            Commands::GenerateManifest(args) => commands::manifest::run_generate(&global, args).await,
            Commands::BuildStaticManifest(args) => {
                commands::manifest::run_build_static(&global, args).await
            }
            Commands::Bootstrap(args) => commands::bootstrap::run(&global, args).await,
            Commands::VerifyNodes(args) => commands::verify::run(&global, args).await,
            Commands::CheckCapacity(args) => commands::capacity::run(&global, args).await,
        }
    }
}
