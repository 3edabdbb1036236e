//! Where generated and merged runtime config lives on disk.
//!
//! Generation writes to `<template dir>/<output dir>/<env>`; the merged view the fleet mounts
//! lives under a staging root keyed by project and env.

use std::path::{Path, PathBuf};

use super::DeployError;
use crate::consts::{APP_NAME, ARTIFACT_MANIFEST_FILE, OUTPUT_DIR};
use crate::platform::paths;
use crate::settings::DeploySettings;

fn template_dir(template_path: &str) -> PathBuf {
  match Path::new(template_path.trim()).parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  }
}

/// Staging root: the settings override, else next to the template, else the data dir.
pub fn staging_root(settings: &DeploySettings, template_path: &str) -> PathBuf {
  if let Some(dir) = &settings.staging_dir {
    return dir.clone();
  }
  if !template_path.trim().is_empty() {
    return template_dir(template_path).join(OUTPUT_DIR).join("staging");
  }
  paths::staging_root()
}

pub fn project_key(project: &str, env: &str) -> String {
  let project = project.trim();
  if !project.is_empty() {
    return project.to_string();
  }
  let env = env.trim();
  if env.is_empty() {
    APP_NAME.to_string()
  } else {
    format!("{}-{}", APP_NAME, env)
  }
}

pub fn env_key(env: &str) -> String {
  let env = env.trim().to_ascii_lowercase();
  if env.is_empty() { "default".to_string() } else { env }
}

/// Merged runtime config dir the fleet reads: `<root>/<project>/<env>/config`.
pub fn staging_config_dir(settings: &DeploySettings, template_path: &str, project: &str, env: &str) -> PathBuf {
  staging_root(settings, template_path)
    .join(project_key(project, env))
    .join(env_key(env))
    .join("config")
}

/// Generation output for one env. An absolute `output_dir` is used as is.
pub fn template_output_dir(template_path: &str, output_dir: &str, env: &str) -> Result<PathBuf, DeployError> {
  if template_path.trim().is_empty() {
    return Err(DeployError::Required("template path"));
  }
  let output_dir = match output_dir.trim() {
    "" => OUTPUT_DIR,
    dir => dir,
  };
  let base = if Path::new(output_dir).is_absolute() {
    PathBuf::from(output_dir)
  } else {
    template_dir(template_path).join(output_dir)
  };
  Ok(base.join(env.trim()))
}

/// Runtime config produced by generation.
pub fn template_config_dir(template_path: &str, output_dir: &str, env: &str) -> Result<PathBuf, DeployError> {
  Ok(template_output_dir(template_path, output_dir, env)?.join("config"))
}

/// Path segment safe for use as a single directory name.
pub fn sanitize_segment(value: &str) -> String {
  let cleaned = value.trim().replace(['/', '\\'], "-");
  match cleaned.as_str() {
    "" | "." | ".." => "default".to_string(),
    _ => cleaned,
  }
}

/// Where a deploy writes its artifact manifest when no path is given.
pub fn default_artifact_path(project_dir: &Path, project: &str, env: &str) -> PathBuf {
  project_dir
    .join(OUTPUT_DIR)
    .join("artifacts")
    .join(sanitize_segment(project))
    .join(sanitize_segment(env))
    .join(ARTIFACT_MANIFEST_FILE)
}
