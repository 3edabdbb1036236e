//! Landing an artifact's runtime config in a staging dir.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{ArtifactError, ArtifactManifest, RuntimeObservation, read_manifest, resolve_entry_paths};
use crate::config::merge_config_dir;

#[derive(Debug, Clone, Default)]
pub struct ApplyArtifactRequest {
  pub artifact_path: PathBuf,
  /// Staging config dir the entries are merged into.
  pub output_dir: PathBuf,
  /// Dotenv file holding the secrets entries may require.
  pub secret_env_path: Option<PathBuf>,
  pub runtime: Option<RuntimeObservation>,
}

/// Result of a successful apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
  pub entries: usize,
  pub warnings: Vec<String>,
}

/// Keys defined with a non-empty value in a dotenv file.
fn read_dotenv_keys(path: &Path) -> Result<BTreeSet<String>, ArtifactError> {
  let data = std::fs::read_to_string(path).map_err(|source| ArtifactError::SecretEnv {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(
    data
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty() && !l.starts_with('#'))
      .filter_map(|l| {
        let l = l.strip_prefix("export ").unwrap_or(l);
        let (key, value) = l.split_once('=')?;
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| key.trim().to_string())
      })
      .collect(),
  )
}

fn check_runtime_stack(
  manifest: &ArtifactManifest,
  runtime: Option<&RuntimeObservation>,
) -> Result<Vec<String>, ArtifactError> {
  let (Some(stack), Some(runtime)) = (&manifest.runtime_stack, runtime) else {
    return Ok(Vec::new());
  };
  let mut warnings = Vec::new();

  let (want, have) = (stack.mode.trim(), runtime.mode.trim());
  if !want.is_empty() && !have.is_empty() && !want.eq_ignore_ascii_case(have) {
    return Err(ArtifactError::RuntimeModeMismatch {
      artifact: want.to_string(),
      runtime: have.to_string(),
      source_desc: runtime.source.clone(),
    });
  }

  let (want, have) = (stack.version.trim(), runtime.version.trim());
  if !want.is_empty() && !have.is_empty() && want != have {
    warnings.push(format!(
      "runtime stack version mismatch: artifact={} runtime={} ({})",
      want, have, runtime.source
    ));
  }
  Ok(warnings)
}

fn check_secrets(manifest: &ArtifactManifest, secret_env_path: Option<&Path>) -> Result<(), ArtifactError> {
  let required: BTreeSet<&str> = manifest
    .artifacts
    .iter()
    .flat_map(|e| e.required_secret_env.iter().map(|k| k.trim()))
    .filter(|k| !k.is_empty())
    .collect();
  if required.is_empty() {
    return Ok(());
  }
  let available = match secret_env_path {
    Some(path) if !path.as_os_str().is_empty() => read_dotenv_keys(path)?,
    _ => BTreeSet::new(),
  };
  let missing: Vec<String> = required
    .into_iter()
    .filter(|k| !available.contains(*k))
    .map(str::to_string)
    .collect();
  if !missing.is_empty() {
    return Err(ArtifactError::MissingSecrets { keys: missing });
  }
  Ok(())
}

/// Validate an artifact against the live runtime and merge its config into `output_dir`.
pub fn apply_artifact(req: &ApplyArtifactRequest) -> Result<ApplyReport, ArtifactError> {
  if req.artifact_path.as_os_str().is_empty() {
    return Err(ArtifactError::PathRequired);
  }
  let manifest = read_manifest(&req.artifact_path)?;
  let warnings = check_runtime_stack(&manifest, req.runtime.as_ref())?;
  check_secrets(&manifest, req.secret_env_path.as_deref())?;

  for entry in &manifest.artifacts {
    let paths = resolve_entry_paths(&req.artifact_path, entry)?;
    if !paths.runtime_config_dir.is_dir() {
      return Err(ArtifactError::ConfigDirMissing {
        path: paths.runtime_config_dir,
      });
    }
    merge_config_dir(&paths.runtime_config_dir, &req.output_dir)?;
    info!(id = %entry.id, root = %paths.artifact_root.display(), "applied artifact entry");
  }

  Ok(ApplyReport {
    entries: manifest.artifacts.len(),
    warnings,
  })
}
