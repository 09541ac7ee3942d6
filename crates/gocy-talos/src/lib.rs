//! Talos integration for gocy
//!
//! - [`talosctl`]: the `talosctl` adapter behind the [`ConfigTool`] seam
//! - [`manifest`]: turns a templated cluster manifest into a static one
//! - [`talosconfig`]: the machine-access context `talosctl` reads
//! - [`topology`]: compares live cluster nodes with the recorded context

#![warn(missing_docs)]

pub mod manifest;
pub mod talosconfig;
pub mod talosctl;
pub mod topology;

pub use manifest::{add_hashbang, ClusterManifest, MachineRole, PatchPipeline, TALOS_HASHBANG};
pub use talosconfig::{TalosConfig, TalosContext};
pub use talosctl::{ConfigTool, Talosctl};
pub use topology::{ClusterNodes, KubeNodeSource, NodeSource};
