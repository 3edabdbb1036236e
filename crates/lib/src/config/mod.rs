//! Runtime configuration files.
//!
//! A config dir holds `functions.yml`, `routing.yml`, `resources.yml` and optionally
//! `image-import.json`. This module reads them into comparable snapshots, counts what changed
//! between two snapshots, and merges one config dir into another with last-write-wins rules.

mod diff;
mod image_import;
mod merge;
mod snapshot;

pub use diff::{ConfigDiff, Counts, diff_snapshots};
pub use image_import::{ImageImportEntry, ImageImportManifest, read_image_import, write_image_import};
pub use merge::merge_config_dir;
pub use snapshot::{ConfigSnapshot, RESOURCE_KINDS, load_snapshot, route_key};

use std::path::{Path, PathBuf};

use serde_yaml::Mapping;
use thiserror::Error;

use crate::util::fs::write_atomic;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("read config {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("decode config {}: {source}", path.display())]
  DecodeYaml { path: PathBuf, source: serde_yaml::Error },

  #[error("decode config {}: {source}", path.display())]
  DecodeJson { path: PathBuf, source: serde_json::Error },

  #[error("encode config {}: {message}", path.display())]
  Encode { path: PathBuf, message: String },

  #[error("write config {}: {source}", path.display())]
  Write { path: PathBuf, source: std::io::Error },
}

/// Read a YAML mapping. Missing files yield `None`; blank files an empty mapping.
pub(crate) fn load_yaml(path: &Path) -> Result<Option<Mapping>, ConfigError> {
  let data = match std::fs::read_to_string(path) {
    Ok(data) => data,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(source) => {
      return Err(ConfigError::Read {
        path: path.to_path_buf(),
        source,
      });
    }
  };
  if data.trim().is_empty() {
    return Ok(Some(Mapping::new()));
  }
  let value: serde_yaml::Value = serde_yaml::from_str(&data).map_err(|source| ConfigError::DecodeYaml {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(Some(match value {
    serde_yaml::Value::Mapping(map) => map,
    _ => Mapping::new(),
  }))
}

pub(crate) fn write_yaml(path: &Path, value: &Mapping) -> Result<(), ConfigError> {
  let rendered = serde_yaml::to_string(value).map_err(|e| ConfigError::Encode {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;
  write_atomic(path, rendered.as_bytes(), ".config-").map_err(|source| ConfigError::Write {
    path: path.to_path_buf(),
    source,
  })
}
