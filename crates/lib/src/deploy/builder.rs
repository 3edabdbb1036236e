//! Generation step.
//!
//! Rendering a template into runtime config (and building function images) is owned by an
//! external generator. The pipeline only sees the [`Builder`] seam; [`GeneratorCommand`] is
//! the default implementation that shells out to a configured program.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::BuildRequest;
use crate::exec::{CommandError, CommandRunner, Invocation};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Command(#[from] CommandError),

  #[error("{0}")]
  Other(String),
}

/// Renders a template into generated output under the template's output dir.
#[async_trait]
pub trait Builder: Send + Sync {
  async fn build(&self, request: &BuildRequest) -> Result<(), BuildError>;
}

/// [`Builder`] running an external generator program.
pub struct GeneratorCommand {
  runner: Arc<dyn CommandRunner>,
  program: String,
}

impl GeneratorCommand {
  pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
    Self {
      runner,
      program: program.into(),
    }
  }

  /// The generator command line for `request`.
  pub fn invocation(&self, request: &BuildRequest) -> Invocation {
    let mut inv = Invocation::new(&self.program)
      .args(["--template", request.template_path.as_str()])
      .args(["--env", request.env.as_str()])
      .args(["--mode", request.mode.as_str()]);
    if !request.output_dir.trim().is_empty() {
      inv = inv.args(["--output", request.output_dir.trim()]);
    }
    if !request.project_name.trim().is_empty() {
      inv = inv.args(["--project", request.project_name.trim()]);
    }
    if !request.tag.trim().is_empty() {
      inv = inv.args(["--tag", request.tag.trim()]);
    }
    if request.no_cache {
      inv = inv.arg("--no-cache");
    }
    if request.bundle {
      inv = inv.arg("--bundle");
    }
    if request.build_images == Some(false) {
      inv = inv.arg("--no-build-images");
    }
    for (flag, pairs) in [
      ("--param", &request.parameters),
      ("--image-source", &request.image_sources),
      ("--image-runtime", &request.image_runtimes),
    ] {
      for (key, value) in pairs {
        inv = inv.arg(flag).arg(format!("{}={}", key, value));
      }
    }
    if !request.project_dir.as_os_str().is_empty() {
      inv = inv.current_dir(&request.project_dir);
    }
    inv.envs(request.runtime_env.iter())
  }
}

#[async_trait]
impl Builder for GeneratorCommand {
  async fn build(&self, request: &BuildRequest) -> Result<(), BuildError> {
    let invocation = self.invocation(request);
    info!(template = %request.template_path, env = %request.env, "generating runtime config");
    if request.verbose {
      self.runner.run(&invocation).await?;
    } else {
      self.runner.run_quiet(&invocation).await?;
    }
    Ok(())
  }
}
