use std::path::PathBuf;

use thiserror::Error;

use super::{BuildError, EnvApplyError, ImageSyncError, ProvisionError, SyncError, WaitError};
use crate::artifact::ArtifactError;
use crate::config::ConfigError;
use crate::util::hash::FileHashError;

/// Errors that abort a deploy or apply run.
#[derive(Debug, Error)]
pub enum DeployError {
  #[error("builder is not configured")]
  BuilderNotConfigured,

  #[error("invalid --image-prewarm value {0:?} (use off|all)")]
  InvalidPrewarmMode(String),

  #[error("{field} mismatch: request={request} context={context}")]
  Conflict {
    field: &'static str,
    request: String,
    context: String,
  },

  #[error("{0} is required")]
  Required(&'static str),

  #[error("registry not ready: {0}")]
  RegistryNotReady(WaitError),

  #[error("image prewarm is required for image-backed functions (use --image-prewarm=all)")]
  PrewarmRequired,

  #[error("bundle manifest not found: {}", path.display())]
  BundleMissing { path: PathBuf },

  #[error("hash template: {0}")]
  TemplateHash(FileHashError),

  #[error("provisioner failed: {0}")]
  Provisioner(ProvisionError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  EnvApply(#[from] EnvApplyError),

  #[error(transparent)]
  Artifact(#[from] ArtifactError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  ImageSync(#[from] ImageSyncError),

  #[error(transparent)]
  Sync(#[from] SyncError),
}
