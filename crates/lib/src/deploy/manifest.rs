//! Artifact manifest describing a fresh generation.
//!
//! A full deploy generates into the template's output dir and then goes through the same
//! artifact-apply path as an artifact produced elsewhere. This module writes the manifest
//! that connects the two.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use tracing::info;

use super::{DeployError, PrewarmMode, staging};
use crate::artifact::{
  ArtifactEntry, ArtifactError, ArtifactGenerator, ArtifactManifest, SCHEMA_VERSION_V1, SourceTemplate,
  compute_artifact_id, write_manifest,
};
use crate::consts::APP_NAME;
use crate::util::fs::relative_path;
use crate::util::hash::hash_file;

const BUNDLE_MANIFEST: &str = "bundle/manifest.json";

/// What a generation run produced.
#[derive(Debug, Clone)]
pub(crate) struct GeneratedArtifact<'a> {
  pub project: &'a str,
  pub env: &'a str,
  pub mode: &'a str,
  pub template_path: &'a str,
  pub output_dir: &'a str,
  pub parameters: &'a BTreeMap<String, String>,
  pub bundle_manifest: bool,
  pub prewarm: PrewarmMode,
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
  match value.trim() {
    "" => default,
    v => v,
  }
}

/// Write the manifest for `generated` at `path` and return it.
pub(crate) fn write_generated_manifest(
  path: &Path,
  generated: &GeneratedArtifact<'_>,
) -> Result<ArtifactManifest, DeployError> {
  let output = staging::template_output_dir(generated.template_path, generated.output_dir, generated.env)?;
  let manifest_dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or(Path::new("."));
  let artifact_root = relative_path(manifest_dir, &output).map_err(|source| ArtifactError::Write {
    path: path.to_path_buf(),
    source,
  })?;

  let bundle_path = output.join(BUNDLE_MANIFEST);
  let bundle_manifest = if bundle_path.is_file() {
    BUNDLE_MANIFEST.to_string()
  } else if generated.bundle_manifest {
    return Err(DeployError::BundleMissing { path: bundle_path });
  } else {
    String::new()
  };

  let template_path = generated.template_path.trim().to_string();
  let sha256 = hash_file(Path::new(&template_path)).map_err(DeployError::TemplateHash)?.0;
  let id = compute_artifact_id(&template_path, generated.parameters, &sha256);

  let manifest = ArtifactManifest {
    schema_version: SCHEMA_VERSION_V1.to_string(),
    project: staging::project_key(generated.project, generated.env),
    env: or_default(generated.env, "default").to_string(),
    mode: or_default(generated.mode, "docker").to_ascii_lowercase(),
    artifacts: vec![ArtifactEntry {
      id,
      artifact_root,
      runtime_config_dir: "config".to_string(),
      bundle_manifest,
      image_prewarm: generated.prewarm.as_str().to_string(),
      source_template: Some(SourceTemplate {
        path: template_path,
        sha256,
        parameters: generated.parameters.clone(),
      }),
      ..ArtifactEntry::default()
    }],
    runtime_stack: None,
    generated_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
    generator: Some(ArtifactGenerator {
      name: APP_NAME.to_string(),
      version: env!("CARGO_PKG_VERSION").to_string(),
    }),
  };
  write_manifest(path, &manifest)?;
  info!(path = %path.display(), "wrote artifact manifest");
  Ok(manifest)
}
