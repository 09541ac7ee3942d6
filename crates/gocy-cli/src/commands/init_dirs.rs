//! `gocy init-dirs`: create the per-cluster secrets directories.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use gocy_common::{fs, Constellation, Workspace};

use crate::{GlobalArgs, Result};

/// Create `<secrets>/<cluster>/` for every cluster
#[derive(Args, Debug)]
pub struct InitDirsArgs {}

/// Run the init-dirs command.
pub fn run(global: &GlobalArgs, _args: InitDirsArgs) -> Result<()> {
    let (workspace, constellation) = global.load()?;
    for dir in init_dirs(&workspace, &constellation)? {
        println!("{}", dir.display());
    }
    Ok(())
}

/// Create the directory of every cluster, bary first
pub fn init_dirs(workspace: &Workspace, constellation: &Constellation) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for cluster in constellation.clusters() {
        let dir = workspace.cluster_dir(&cluster.name);
        fs::create_dir_all(&dir)?;
        info!(cluster = %cluster.name, path = %dir.display(), "Cluster directory ready");
        dirs.push(dir);
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    #[test]
    fn creates_one_dir_per_cluster() {
        let (dir, workspace) = test_support::workspace();
        let constellation = workspace.load_constellation().unwrap();

        let created = init_dirs(&workspace, &constellation).unwrap();
        assert_eq!(
            created,
            vec![
                dir.path().join("jupiter").join("jupiter"),
                dir.path().join("jupiter").join("io"),
            ]
        );
        assert!(created.iter().all(|d| d.is_dir()));

        // Idempotent
        init_dirs(&workspace, &constellation).unwrap();
    }
}
