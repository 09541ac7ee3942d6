//! `gocy use`: switch the active constellation.
//!
//! Constellations are the `<name>.constellation.yaml` files in the config root.
//! The active one is stored in `<root>/ccontext`.
//!
//! # Usage
//!
//! ```bash
//! # List available constellations
//! gocy use
//!
//! # Switch to a constellation
//! gocy use saturn
//! ```

use clap::Args;

use gocy_common::workspace::{read_context, resolve_root};
use gocy_common::{Constellation, Workspace};

use crate::{Error, GlobalArgs, Result};

/// Show or switch the active constellation
#[derive(Args, Debug)]
pub struct UseArgs {
    /// Constellation to switch to (omit to list available constellations)
    pub name: Option<String>,
}

/// Run the use command.
pub fn run(global: &GlobalArgs, args: UseArgs) -> Result<()> {
    let root = resolve_root(global.root.as_deref())?;
    let workspace = Workspace::new(&root, read_context(&root));

    match args.name {
        None => {
            let available = workspace.available_constellations()?;
            if available.is_empty() {
                println!("No constellations found in {}.", root.display());
                return Ok(());
            }
            println!("Available constellations:");
            for name in &available {
                let marker = if name == workspace.context() { " *" } else { "" };
                println!("  {}{}", name, marker);
            }
            println!();
            println!("Use `gocy use <name>` to switch.");
        }
        Some(target) => {
            switch(&workspace, &target)?;
            println!("Switched to constellation '{}'.", target);
        }
    }

    Ok(())
}

/// Validate the target constellation and make it the active one
pub fn switch(workspace: &Workspace, target: &str) -> Result<()> {
    let path = workspace.constellation_path_for(target);
    if !path.exists() {
        let available = workspace.available_constellations()?;
        return Err(Error::command_failed(format!(
            "constellation '{}' not found. Available: {}",
            target,
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        )));
    }

    Constellation::load(&path)?;
    workspace.save_context(target)?;
    Ok(())
}
