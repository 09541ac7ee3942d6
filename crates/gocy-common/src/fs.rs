//! File persistence helpers
//!
//! Reservation records, address files and static manifests are the only durable
//! state. They are written to a temporary file next to the target and renamed
//! into place, so a crash never leaves a half-written file behind.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Read a file to a string, attaching the path to any error
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Create a directory and its parents
pub fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

/// Write `contents` to `path` atomically (temp file in the same directory, then rename)
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Serialize a value as YAML and write it atomically
pub fn write_yaml<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value)?;
    write_atomic(path, yaml.as_bytes())
}

/// Read and deserialize a YAML file
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path)?;
    serde_yaml::from_str(&content)
        .map_err(|e| Error::validation(path.display().to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn write_atomic_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jupiter").join("ip-cp-addresses.yaml");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(leftovers.len(), 1, "temp files must not be left behind");
    }

    #[test]
    fn yaml_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        let value = BTreeMap::from([("public_ipv4".to_string(), vec!["1.2.3.4".to_string()])]);

        write_yaml(&path, &value).unwrap();
        let back: BTreeMap<String, Vec<String>> = read_yaml(&path).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn read_yaml_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "a: [unclosed").unwrap();

        let err = read_yaml::<serde_yaml::Value>(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let err = read_to_string(Path::new("/nonexistent/gocy/file")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
