use std::collections::BTreeMap;
use std::path::PathBuf;

use super::RuntimeEnv;

/// Resolved project identity for one deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployContext {
  pub project_dir: PathBuf,
  /// Compose project name. Rewritten once when the live gateway belongs to another project.
  pub compose_project: String,
  pub template_path: String,
  pub env: String,
  /// `docker` or `containerd`.
  pub mode: String,
}

/// Caller intent for a deploy or apply run.
///
/// `template_path`, `env` and `mode` may also be set on the embedded context; when both are
/// set they must agree.
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
  pub context: DeployContext,
  pub template_path: String,
  pub env: String,
  pub mode: String,
  /// Generation output dir relative to the template, `.edgebox` when empty.
  pub output_dir: String,
  pub parameters: BTreeMap<String, String>,
  pub tag: String,
  pub no_cache: bool,
  pub no_deps: bool,
  pub verbose: bool,
  pub build_only: bool,
  /// `None` leaves the decision to the generator.
  pub build_images: Option<bool>,
  pub bundle_manifest: bool,
  pub image_sources: BTreeMap<String, String>,
  pub image_runtimes: BTreeMap<String, String>,
  /// `off` or `all`; empty means `all`.
  pub image_prewarm: String,
  pub compose_files: Vec<String>,
  /// Artifact manifest to apply. For a full deploy this is where the generated manifest is
  /// written, defaulting to `<project dir>/.edgebox/artifacts/<project>/<env>/artifact.yml`.
  pub artifact_path: Option<PathBuf>,
  pub secret_env_path: Option<PathBuf>,
}

/// Input of the generation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
  pub project_dir: PathBuf,
  pub project_name: String,
  pub template_path: String,
  pub env: String,
  pub mode: String,
  pub output_dir: String,
  pub parameters: BTreeMap<String, String>,
  pub image_sources: BTreeMap<String, String>,
  pub image_runtimes: BTreeMap<String, String>,
  pub tag: String,
  pub no_cache: bool,
  pub verbose: bool,
  pub build_images: Option<bool>,
  pub bundle: bool,
  pub runtime_env: RuntimeEnv,
}
