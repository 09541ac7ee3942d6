//! Error types for gocy
//!
//! Every variant is terminal for the current run. Variants that an operator has
//! to act on (topology drift, config validation) carry the offending identifiers.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for gocy operations
#[derive(Debug, Error)]
pub enum Error {
    /// An external tool exited with a non-success status
    #[error("command `{command}` failed: {message}")]
    ExternalCommand {
        /// The command line that was run (arguments only, no environment)
        command: String,
        /// Captured stderr or spawn error
        message: String,
    },

    /// The provider API rejected a request or could not be reached
    #[error("provider API error [{endpoint}]: {message}")]
    Provider {
        /// Endpoint path relative to the API base URL
        endpoint: String,
        /// Status and body, or the transport error
        message: String,
    },

    /// Tag matching found zero or ambiguous candidates where exactly one was expected
    #[error("inventory mismatch for {cluster}/{role}: {message}")]
    InventoryMismatch {
        /// Cluster being reconciled
        cluster: String,
        /// VIP role being reconciled
        role: String,
        /// What was found
        message: String,
    },

    /// A run attempted to reserve a second global resource
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violated constraint
        message: String,
    },

    /// A generated machine configuration failed external validation
    #[error("validation of {config} for cluster {cluster} failed: {message}")]
    ValidationFailure {
        /// Cluster the configuration belongs to
        cluster: String,
        /// Path of the rejected configuration
        config: String,
        /// Validator output
        message: String,
    },

    /// Live cluster nodes disagree with the recorded machine-access context
    #[error(
        "node list of cluster {cluster} is out of sync with its talosconfig: live only [{}], recorded only [{}]",
        .live_only.join(", "),
        .recorded_only.join(", ")
    )]
    TopologyDrift {
        /// Cluster whose topology drifted
        cluster: String,
        /// Addresses reported by the cluster but absent from the record
        live_only: Vec<String>,
        /// Addresses recorded but not reported by the cluster
        recorded_only: Vec<String>,
    },

    /// Malformed desired state, manifest or local file
    #[error("validation error for {context}: {message}")]
    Validation {
        /// Cluster name or file the problem was found in
        context: String,
        /// Description of what's invalid
        message: String,
    },

    /// Filesystem error
    #[error("io error at {}: {source}", .path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// The underlying io error
        source: std::io::Error,
    },

    /// YAML (de)serialization error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },
}

impl Error {
    /// Create an external command failure
    pub fn external(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalCommand {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a provider API failure
    pub fn provider(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create an inventory mismatch for a cluster and VIP role
    pub fn inventory_mismatch(
        cluster: impl Into<String>,
        role: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::InventoryMismatch {
            cluster: cluster.into(),
            role: role.to_string(),
            message: message.into(),
        }
    }

    /// Create a constraint violation
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Create a machine-config validation failure
    pub fn validation_failure(
        cluster: impl Into<String>,
        config: &Path,
        message: impl Into<String>,
    ) -> Self {
        Self::ValidationFailure {
            cluster: cluster.into(),
            config: config.display().to_string(),
            message: message.into(),
        }
    }

    /// Create a validation error with the given context (cluster name or file)
    pub fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Wrap an io error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_drift_names_every_address() {
        let err = Error::TopologyDrift {
            cluster: "jupiter".to_string(),
            live_only: vec!["10.0.0.2".to_string()],
            recorded_only: vec!["10.0.0.3".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("jupiter"));
        assert!(msg.contains("live only [10.0.0.2]"));
        assert!(msg.contains("recorded only [10.0.0.3]"));
    }

    #[test]
    fn inventory_mismatch_formats_role() {
        let err = Error::inventory_mismatch("io", "cp", "no addresses");
        assert_eq!(err.to_string(), "inventory mismatch for io/cp: no addresses");
    }

    #[test]
    fn io_error_includes_path() {
        let err = Error::io(
            "/tmp/missing.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing.yaml"));
    }
}
