mod apply;
mod artifact;
mod deploy;
mod prune;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use edgebox_lib::deploy::{
  ComposeProvisioner, DeployContext, DeployRequest, DeployWorkflow, GeneratorCommand, HttpRegistryWaiter,
};
use edgebox_lib::exec::{CommandRunner, ProcessRunner};
use edgebox_lib::fleet::{DockerCliFleet, FleetClient};
use edgebox_lib::settings::DeploySettings;
use edgebox_lib::ui::UserInterface;

use crate::TargetArgs;
use crate::output::ConsoleUi;

pub use apply::cmd_apply;
pub use artifact::{cmd_artifact_id, cmd_artifact_show};
pub use deploy::cmd_deploy;
pub use prune::cmd_prune;

fn load_settings(target: Option<&TargetArgs>) -> Result<DeploySettings> {
  let mut settings = DeploySettings::from_env().context("Failed to read EDGEBOX_* settings")?;
  if let Some(timeout) = target.and_then(|t| t.registry_timeout) {
    settings.registry_timeout = timeout;
  }
  debug!(
    registry = %settings.registry_address(),
    timeout = ?settings.registry_timeout,
    generator = ?settings.generator,
    "loaded settings"
  );
  Ok(settings)
}

fn docker_fleet(runner: Arc<dyn CommandRunner>, settings: &DeploySettings) -> Arc<dyn FleetClient> {
  Arc::new(DockerCliFleet::new(runner, settings.docker.clone()))
}

/// Wire the default adapters around a [`DeployWorkflow`].
fn workflow(settings: DeploySettings) -> DeployWorkflow {
  let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
  let ui: Arc<dyn UserInterface> = Arc::new(ConsoleUi);
  let fleet = docker_fleet(runner.clone(), &settings);
  let provisioner = ComposeProvisioner::new(runner.clone(), Some(fleet.clone()), settings.docker.clone(), ui.clone());

  let builder = settings
    .generator
    .clone()
    .map(|program| GeneratorCommand::new(runner.clone(), program));
  let mut workflow = DeployWorkflow::new(
    Arc::new(provisioner),
    Arc::new(HttpRegistryWaiter::new()),
    runner,
    ui,
    settings,
  )
  .with_fleet(fleet);
  if let Some(builder) = builder {
    workflow = workflow.with_builder(Arc::new(builder));
  }
  workflow
}

fn to_map(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
  pairs.into_iter().collect()
}

/// Request fields shared by deploy and apply.
fn base_request(target: TargetArgs, verbose: bool) -> Result<DeployRequest> {
  let project_dir = dunce::canonicalize(&target.project_dir)
    .with_context(|| format!("Project directory not found: {}", target.project_dir.display()))?;
  Ok(DeployRequest {
    context: DeployContext {
      project_dir,
      compose_project: target.project,
      ..DeployContext::default()
    },
    template_path: target.template,
    env: target.env,
    mode: target.mode,
    no_deps: target.no_deps,
    verbose,
    image_prewarm: target.image_prewarm,
    compose_files: target.compose_files,
    secret_env_path: target.secret_env,
    ..DeployRequest::default()
  })
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  Ok(rt.block_on(future))
}
