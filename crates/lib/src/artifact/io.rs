//! Reading, validating and atomically writing artifact manifests.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ArtifactEntry, ArtifactError, ArtifactManifest, SCHEMA_VERSION_V1, compute_artifact_id};
use crate::util::fs::{normalize_lexical, write_atomic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
  Yaml,
  Json,
}

impl Format {
  fn of(path: &Path) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => Format::Yaml,
      _ => Format::Json,
    }
  }
}

fn invalid(field: impl Into<String>, problem: &str) -> ArtifactError {
  ArtifactError::Invalid {
    field: field.into(),
    problem: problem.to_string(),
  }
}

fn is_absolute(value: &str) -> bool {
  value.starts_with('/') || value.starts_with('\\') || Path::new(value).is_absolute()
}

/// Check a path that must stay inside the artifact root.
fn validate_relative_path(field: &str, value: &str) -> Result<(), ArtifactError> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(invalid(field, "is required"));
  }
  if is_absolute(trimmed) {
    return Err(invalid(field, "must be a relative path"));
  }
  let cleaned = normalize_lexical(trimmed);
  if cleaned == "." {
    return Err(invalid(field, "must not be '.'"));
  }
  if cleaned == ".." || cleaned.starts_with("../") {
    return Err(invalid(field, "must not escape artifact root"));
  }
  Ok(())
}

fn require(field: &str, value: &str) -> Result<(), ArtifactError> {
  if value.trim().is_empty() {
    return Err(invalid(field, "is required"));
  }
  Ok(())
}

fn validate_entry(index: usize, entry: &ArtifactEntry) -> Result<(), ArtifactError> {
  let field = |name: &str| format!("artifacts[{}].{}", index, name);

  require(&field("id"), &entry.id)?;

  let root = entry.artifact_root.trim();
  if root.is_empty() {
    return Err(invalid(field("artifact_root"), "is required"));
  }
  if is_absolute(root) {
    return Err(invalid(field("artifact_root"), "must be a relative path"));
  }

  validate_relative_path(&field("runtime_config_dir"), &entry.runtime_config_dir)?;
  if !entry.bundle_manifest.trim().is_empty() {
    validate_relative_path(&field("bundle_manifest"), &entry.bundle_manifest)?;
  }

  if entry.required_secret_env.iter().any(|k| k.trim().is_empty()) {
    return Err(invalid(field("required_secret_env"), "contains empty key"));
  }

  if let Some(source) = &entry.source_template
    && !source.path.trim().is_empty()
  {
    let expected = compute_artifact_id(&source.path, &source.parameters, &source.sha256);
    if entry.id.trim() != expected {
      return Err(ArtifactError::IdMismatch {
        field: field("id"),
        expected,
        actual: entry.id.trim().to_string(),
      });
    }
  }
  Ok(())
}

/// Check every manifest invariant.
pub fn validate_manifest(manifest: &ArtifactManifest) -> Result<(), ArtifactError> {
  require("schema_version", &manifest.schema_version)?;
  if manifest.schema_version.trim() != SCHEMA_VERSION_V1 {
    return Err(ArtifactError::UnsupportedSchema(manifest.schema_version.trim().to_string()));
  }
  require("project", &manifest.project)?;
  require("env", &manifest.env)?;
  require("mode", &manifest.mode)?;
  if manifest.artifacts.is_empty() {
    return Err(invalid("artifacts", "must contain at least one entry"));
  }
  for (index, entry) in manifest.artifacts.iter().enumerate() {
    validate_entry(index, entry)?;
  }
  Ok(())
}

/// Sort entries by root and secret lists into sorted, deduplicated, trimmed form.
fn normalize(manifest: &ArtifactManifest) -> ArtifactManifest {
  let mut out = manifest.clone();
  for entry in &mut out.artifacts {
    let mut secrets: Vec<String> = entry
      .required_secret_env
      .iter()
      .map(|k| k.trim().to_string())
      .filter(|k| !k.is_empty())
      .collect();
    secrets.sort();
    secrets.dedup();
    entry.required_secret_env = secrets;
  }
  out.artifacts.sort_by(|a, b| a.artifact_root.cmp(&b.artifact_root));
  out
}

/// Read and validate a manifest. YAML for `.yml`/`.yaml`, JSON otherwise.
pub fn read_manifest(path: &Path) -> Result<ArtifactManifest, ArtifactError> {
  if path.as_os_str().is_empty() {
    return Err(ArtifactError::PathRequired);
  }
  let data = std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let decode_err = |message: String| ArtifactError::Decode {
    path: path.to_path_buf(),
    message,
  };
  let manifest: ArtifactManifest = match Format::of(path) {
    Format::Yaml => serde_yaml::from_str(&data).map_err(|e| decode_err(e.to_string()))?,
    Format::Json => serde_json::from_str(&data).map_err(|e| decode_err(e.to_string()))?,
  };
  validate_manifest(&manifest)?;
  Ok(manifest)
}

/// Validate, normalize and atomically write a manifest.
pub fn write_manifest(path: &Path, manifest: &ArtifactManifest) -> Result<(), ArtifactError> {
  if path.as_os_str().is_empty() {
    return Err(ArtifactError::PathRequired);
  }
  validate_manifest(manifest)?;
  let normalized = normalize(manifest);

  let encode_err = |message: String| ArtifactError::Encode {
    path: path.to_path_buf(),
    message,
  };
  let rendered = match Format::of(path) {
    Format::Yaml => serde_yaml::to_string(&normalized).map_err(|e| encode_err(e.to_string()))?,
    Format::Json => {
      let mut json = serde_json::to_string_pretty(&normalized).map_err(|e| encode_err(e.to_string()))?;
      json.push('\n');
      json
    }
  };

  write_atomic(path, rendered.as_bytes(), ".artifact-").map_err(|source| ArtifactError::Write {
    path: path.to_path_buf(),
    source,
  })?;
  debug!(path = %path.display(), entries = normalized.artifacts.len(), "wrote artifact manifest");
  Ok(())
}

/// Absolute locations of one entry's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
  pub artifact_root: PathBuf,
  pub runtime_config_dir: PathBuf,
  pub bundle_manifest: Option<PathBuf>,
}

fn join_normalized(base: &Path, rel: &str) -> PathBuf {
  PathBuf::from(normalize_lexical(&base.join(rel.trim()).to_string_lossy()))
}

/// Resolve an entry's paths against the manifest location.
pub fn resolve_entry_paths(manifest_path: &Path, entry: &ArtifactEntry) -> Result<EntryPaths, ArtifactError> {
  let root = entry.artifact_root.trim();
  if root.is_empty() {
    return Err(invalid("artifact_root", "is required"));
  }
  if is_absolute(root) {
    return Err(invalid("artifact_root", "must be a relative path"));
  }
  validate_relative_path("runtime_config_dir", &entry.runtime_config_dir)?;

  let manifest_dir = std::path::absolute(manifest_path)
    .ok()
    .and_then(|p| p.parent().map(Path::to_path_buf))
    .unwrap_or_else(|| PathBuf::from("."));
  let artifact_root = join_normalized(&manifest_dir, root);
  let runtime_config_dir = join_normalized(&artifact_root, &entry.runtime_config_dir);
  let bundle_manifest = if entry.bundle_manifest.trim().is_empty() {
    None
  } else {
    validate_relative_path("bundle_manifest", &entry.bundle_manifest)?;
    Some(join_normalized(&artifact_root, &entry.bundle_manifest))
  };

  Ok(EntryPaths {
    artifact_root,
    runtime_config_dir,
    bundle_manifest,
  })
}
