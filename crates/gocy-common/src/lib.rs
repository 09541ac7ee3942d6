//! Common types for gocy: the constellation model, errors, workspace layout and
//! the plumbing used to talk to external tools.

#![warn(missing_docs)]

pub mod command;
pub mod constellation;
pub mod error;
pub mod fs;
pub mod workspace;

pub use command::{CommandRunner, ExternalCommand, ProcessRunner};
pub use constellation::{Cluster, Constellation, NodePlan, VipRole, VipSpec, VipType};
pub use error::Error;
pub use workspace::Workspace;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Port the Kubernetes API server listens on behind the control-plane VIP
pub const CONTROL_PLANE_PORT: u16 = 6443;

/// Build the control-plane endpoint URL for a VIP address
pub fn control_plane_url(vip: &str) -> String {
    format!("https://{}:{}", vip, CONTROL_PLANE_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_plane_url_uses_api_port() {
        assert_eq!(control_plane_url("147.75.1.1"), "https://147.75.1.1:6443");
    }
}
