//! `image-import.json`: images that must be mirrored into the local registry before the
//! functions that use them can start.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::util::fs::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageImportManifest {
  #[serde(default)]
  pub version: String,
  /// Registry host that replaces the registry part of every `image_ref`.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub push_target: String,
  #[serde(default)]
  pub images: Vec<ImageImportEntry>,
}

impl ImageImportManifest {
  pub fn is_empty(&self) -> bool {
    self.images.is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageImportEntry {
  #[serde(default)]
  pub function_name: String,
  /// Where the image is pulled from.
  #[serde(default)]
  pub image_source: String,
  /// Where the runtime expects to find it.
  #[serde(default)]
  pub image_ref: String,
}

/// Read an image import manifest. A missing file is `None`; a blank one is empty.
pub fn read_image_import(path: &Path) -> Result<Option<ImageImportManifest>, ConfigError> {
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
    return Ok(Some(ImageImportManifest::default()));
  }
  serde_json::from_str(&data)
    .map(Some)
    .map_err(|source| ConfigError::DecodeJson {
      path: path.to_path_buf(),
      source,
    })
}

pub fn write_image_import(path: &Path, manifest: &ImageImportManifest) -> Result<(), ConfigError> {
  let mut rendered = serde_json::to_string_pretty(manifest).map_err(|e| ConfigError::Encode {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;
  rendered.push('\n');
  write_atomic(path, rendered.as_bytes(), ".image-import-").map_err(|source| ConfigError::Write {
    path: path.to_path_buf(),
    source,
  })
}
