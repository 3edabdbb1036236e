use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The only recognized manifest schema.
pub const SCHEMA_VERSION_V1: &str = "1";

/// Describes a set of generated artifacts and how to land them on a fleet.
///
/// Produced by the generation step, consumed by artifact apply. Unknown fields are rejected
/// at every level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactManifest {
  pub schema_version: String,
  pub project: String,
  pub env: String,
  pub mode: String,
  pub artifacts: Vec<ArtifactEntry>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub runtime_stack: Option<RuntimeStack>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub generated_at: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub generator: Option<ArtifactGenerator>,
}

/// Runtime the artifact was produced for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeStack {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub mode: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactGenerator {
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactEntry {
  /// Content-derived id, see [`compute_artifact_id`](super::compute_artifact_id).
  pub id: String,
  /// Relative to the manifest's directory.
  pub artifact_root: String,
  /// Relative to `artifact_root`.
  pub runtime_config_dir: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub bundle_manifest: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image_prewarm: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub required_secret_env: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_template: Option<SourceTemplate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub runtime_meta: Option<RuntimeMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceTemplate {
  pub path: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub sha256: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeMeta {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub runtime_hooks: Option<RuntimeHooksMeta>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub template_renderer: Option<RendererMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeHooksMeta {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub api_version: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub python_sitecustomize_digest: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub java_agent_digest: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub java_wrapper_digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RendererMeta {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub api_version: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub template_digest: String,
}

/// Mode and version actually detected in the live fleet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeObservation {
  pub mode: String,
  pub version: String,
  /// Where the observation came from, e.g. `docker compose project=edge service=gateway`.
  pub source: String,
}
