//! CLI commands

pub mod bootstrap;
pub mod capacity;
pub mod cpem;
pub mod gen_config;
pub mod init_dirs;
pub mod manifest;
pub mod use_constellation;
pub mod verify;
pub mod vips;

use std::fmt::Display;

use crate::{Error, Result};

/// Extension trait for converting errors to `Error::CommandFailed`.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}
