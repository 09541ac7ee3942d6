//! `talosctl` adapter

use std::path::Path;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use gocy_common::{CommandRunner, ExternalCommand, ProcessRunner, Result};

/// Operations gocy needs from the machine-config tool
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigTool: Send + Sync {
    /// Generate base role configs and a talosconfig for `cluster` into `out_dir`
    async fn generate(&self, cluster: &str, endpoint: &str, out_dir: &Path, force: bool)
        -> Result<()>;

    /// Apply a patch list to a base config, returning the patched config
    async fn patch(&self, base: &Path, patches: &Path) -> Result<String>;

    /// Validate a config file for cloud-style boot
    async fn validate(&self, config: &Path) -> Result<()>;

    /// Bootstrap etcd on one control-plane node
    async fn bootstrap(&self, talosconfig: &Path, node: &str) -> Result<()>;

    /// Fetch an admin kubeconfig through `node` into `out`
    async fn kubeconfig(&self, talosconfig: &Path, node: &str, out: &Path) -> Result<()>;
}

/// [`ConfigTool`] that shells out to `talosctl`
pub struct Talosctl<R = ProcessRunner> {
    runner: R,
    program: String,
}

impl Talosctl<ProcessRunner> {
    /// `talosctl` from `PATH`, run as a child process
    pub fn new() -> Self {
        Self::with_runner(ProcessRunner)
    }
}

impl Default for Talosctl<ProcessRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> Talosctl<R> {
    /// `talosctl` run through a custom runner
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            program: "talosctl".to_string(),
        }
    }

    fn command(&self) -> ExternalCommand {
        ExternalCommand::new(&self.program)
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl<R: CommandRunner> ConfigTool for Talosctl<R> {
    async fn generate(
        &self,
        cluster: &str,
        endpoint: &str,
        out_dir: &Path,
        force: bool,
    ) -> Result<()> {
        let mut cmd = self
            .command()
            .args(["gen", "config", cluster, endpoint])
            .arg("--output-dir")
            .arg(path_arg(out_dir))
            .current_dir(out_dir);
        if force {
            cmd = cmd.arg("--force");
        }
        self.runner.run(&cmd).await?;
        info!(cluster, endpoint, "Generated Talos base configs");
        Ok(())
    }

    async fn patch(&self, base: &Path, patches: &Path) -> Result<String> {
        let cmd = self
            .command()
            .args(["machineconfig", "patch"])
            .arg(path_arg(base))
            .arg("--patch")
            .arg(format!("@{}", patches.display()));
        self.runner.run(&cmd).await
    }

    async fn validate(&self, config: &Path) -> Result<()> {
        let cmd = self
            .command()
            .args(["validate", "--mode", "cloud", "--config"])
            .arg(path_arg(config));
        self.runner.run(&cmd).await.map(|_| ())
    }

    async fn bootstrap(&self, talosconfig: &Path, node: &str) -> Result<()> {
        let cmd = self
            .command()
            .arg("--talosconfig")
            .arg(path_arg(talosconfig))
            .args(["bootstrap", "--nodes", node]);
        self.runner.run(&cmd).await.map(|_| ())
    }

    async fn kubeconfig(&self, talosconfig: &Path, node: &str, out: &Path) -> Result<()> {
        let cmd = self
            .command()
            .arg("--talosconfig")
            .arg(path_arg(talosconfig))
            .args(["--nodes", node, "kubeconfig", "--force"])
            .arg(path_arg(out));
        self.runner.run(&cmd).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gocy_common::Error;
    use mockall::mock;
    use std::path::PathBuf;

    mock! {
        Runner {}

        #[async_trait]
        impl CommandRunner for Runner {
            async fn run(&self, command: &ExternalCommand) -> Result<String>;
        }
    }

    fn args(cmd: &ExternalCommand) -> Vec<&str> {
        cmd.get_args().iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn gen_config_targets_the_vip_endpoint() {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|cmd| {
                cmd.program() == "talosctl"
                    && args(cmd)
                        == [
                            "gen",
                            "config",
                            "jupiter",
                            "https://147.75.1.1:6443",
                            "--output-dir",
                            "/secrets/jupiter",
                            "--force",
                        ]
                    && cmd.get_current_dir() == Some(Path::new("/secrets/jupiter"))
            })
            .times(1)
            .returning(|_| Ok(String::new()));

        Talosctl::with_runner(runner)
            .generate(
                "jupiter",
                "https://147.75.1.1:6443",
                Path::new("/secrets/jupiter"),
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn patch_returns_stdout() {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|cmd| {
                args(cmd)
                    == [
                        "machineconfig",
                        "patch",
                        "/d/worker.yaml",
                        "--patch",
                        "@/d/worker-patches.yaml",
                    ]
            })
            .returning(|_| Ok("version: v1alpha1\n".to_string()));

        let out = Talosctl::with_runner(runner)
            .patch(
                &PathBuf::from("/d/worker.yaml"),
                &PathBuf::from("/d/worker-patches.yaml"),
            )
            .await
            .unwrap();
        assert_eq!(out, "version: v1alpha1\n");
    }

    #[tokio::test]
    async fn validate_uses_cloud_mode() {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|cmd| args(cmd) == ["validate", "--mode", "cloud", "--config", "/d/worker-capi.yaml"])
            .returning(|cmd| Err(Error::external(cmd.to_string(), "exit status: 1: invalid")));

        let err = Talosctl::with_runner(runner)
            .validate(Path::new("/d/worker-capi.yaml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid"));
    }

    #[tokio::test]
    async fn bootstrap_and_kubeconfig_use_the_talosconfig() {
        let mut runner = MockRunner::new();
        let mut seq = mockall::Sequence::new();
        runner
            .expect_run()
            .withf(|cmd| args(cmd) == ["--talosconfig", "/d/talosconfig", "bootstrap", "--nodes", "147.75.1.2"])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(String::new()));
        runner
            .expect_run()
            .withf(|cmd| {
                args(cmd)
                    == [
                        "--talosconfig",
                        "/d/talosconfig",
                        "--nodes",
                        "147.75.1.1",
                        "kubeconfig",
                        "--force",
                        "/d/jupiter.kubeconfig",
                    ]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(String::new()));

        let talosctl = Talosctl::with_runner(runner);
        let talosconfig = Path::new("/d/talosconfig");
        talosctl.bootstrap(talosconfig, "147.75.1.2").await.unwrap();
        talosctl
            .kubeconfig(talosconfig, "147.75.1.1", Path::new("/d/jupiter.kubeconfig"))
            .await
            .unwrap();
    }
}
