//! Artifact manifests.
//!
//! An artifact manifest lists generated artifacts (one per source template) together with the
//! relative paths of their runtime config and the secrets they need. Manifests are validated
//! on both read and write, and every path must stay inside its artifact root.

mod apply;
mod id;
mod io;
mod types;

pub use apply::{ApplyArtifactRequest, ApplyReport, apply_artifact};
pub use id::compute_artifact_id;
pub use io::{EntryPaths, read_manifest, resolve_entry_paths, validate_manifest, write_manifest};
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("artifact path is required")]
  PathRequired,

  #[error("read artifact manifest {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("decode artifact manifest {}: {message}", path.display())]
  Decode { path: PathBuf, message: String },

  #[error("encode artifact manifest {}: {message}", path.display())]
  Encode { path: PathBuf, message: String },

  #[error("write artifact manifest {}: {source}", path.display())]
  Write { path: PathBuf, source: std::io::Error },

  #[error("{field} {problem}")]
  Invalid { field: String, problem: String },

  #[error("unsupported schema_version {0:?} (expected \"1\")")]
  UnsupportedSchema(String),

  #[error("{field} mismatch: manifest={actual} computed={expected}")]
  IdMismatch {
    field: String,
    expected: String,
    actual: String,
  },

  #[error("runtime stack mode mismatch: artifact={artifact} runtime={runtime} ({source_desc})")]
  RuntimeModeMismatch {
    artifact: String,
    runtime: String,
    source_desc: String,
  },

  #[error("read secret env file {}: {source}", path.display())]
  SecretEnv { path: PathBuf, source: std::io::Error },

  #[error("missing required secret env: {}", keys.join(", "))]
  MissingSecrets { keys: Vec<String> },

  #[error("runtime config dir not found: {}", path.display())]
  ConfigDirMissing { path: PathBuf },

  #[error(transparent)]
  Config(#[from] ConfigError),
}
