//! The deploy pipeline.
//!
//! A single pass over fixed phases: normalize the request, align with the live gateway,
//! resolve the runtime env, wait for the registry, generate, summarize, then apply the
//! resulting artifact (prewarm, propagate, provision). Nothing is retried here; only the
//! registry waiter polls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::manifest::{GeneratedArtifact, write_generated_manifest};
use super::{
  BuildRequest, Builder, DeployContext, DeployError, DeployRequest, EnvApplier, GatewayRuntimeInfo, PrewarmMode,
  ProvisionRequest, Provisioner, RegistryWaiter, RuntimeEnv, align_gateway, prewarm_images, propagate_runtime_config,
  resolve_runtime_observation, staging, summary,
};
use crate::artifact::{ApplyArtifactRequest, ArtifactError, apply_artifact};
use crate::config::{ConfigSnapshot, read_image_import};
use crate::consts::IMAGE_IMPORT_FILE;
use crate::exec::CommandRunner;
use crate::fleet::FleetClient;
use crate::settings::DeploySettings;
use crate::ui::UserInterface;

/// Fill `context` from the request, failing on disagreement.
fn reconcile(field: &'static str, request: &str, context: &mut String) -> Result<(), DeployError> {
  let request = request.trim();
  if request.is_empty() {
    return Ok(());
  }
  if context.trim().is_empty() {
    *context = request.to_string();
    return Ok(());
  }
  if context.trim() != request {
    return Err(DeployError::Conflict {
      field,
      request: request.to_string(),
      context: context.trim().to_string(),
    });
  }
  Ok(())
}

fn reconcile_context(req: &DeployRequest) -> Result<DeployContext, DeployError> {
  let mut context = req.context.clone();
  reconcile("template path", &req.template_path, &mut context.template_path)?;
  reconcile("env", &req.env, &mut context.env)?;
  reconcile("mode", &req.mode, &mut context.mode)?;
  Ok(context)
}

/// Identity resolved by the shared front half of the pipeline.
struct Prepared {
  env: RuntimeEnv,
  staging_dir: PathBuf,
  /// Staging config as it was before this run touched it.
  before: ConfigSnapshot,
}

/// Runs deploys against one fleet.
pub struct DeployWorkflow {
  builder: Option<Arc<dyn Builder>>,
  provisioner: Arc<dyn Provisioner>,
  waiter: Arc<dyn RegistryWaiter>,
  fleet: Option<Arc<dyn FleetClient>>,
  runner: Arc<dyn CommandRunner>,
  ui: Arc<dyn UserInterface>,
  env_applier: Option<Arc<dyn EnvApplier>>,
  settings: DeploySettings,
}

impl DeployWorkflow {
  pub fn new(
    provisioner: Arc<dyn Provisioner>,
    waiter: Arc<dyn RegistryWaiter>,
    runner: Arc<dyn CommandRunner>,
    ui: Arc<dyn UserInterface>,
    settings: DeploySettings,
  ) -> Self {
    Self {
      builder: None,
      provisioner,
      waiter,
      fleet: None,
      runner,
      ui,
      env_applier: None,
      settings,
    }
  }

  pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
    self.builder = Some(builder);
    self
  }

  /// Without a fleet client gateway alignment, observation and config propagation are skipped.
  pub fn with_fleet(mut self, fleet: Arc<dyn FleetClient>) -> Self {
    self.fleet = Some(fleet);
    self
  }

  pub fn with_env_applier(mut self, applier: Arc<dyn EnvApplier>) -> Self {
    self.env_applier = Some(applier);
    self
  }

  /// Generate from a template and land the result on the fleet.
  pub async fn run(&self, req: DeployRequest) -> Result<(), DeployError> {
    let builder = self.builder.as_ref().ok_or(DeployError::BuilderNotConfigured)?;
    let prewarm = PrewarmMode::parse(&req.image_prewarm)?;
    let mut context = reconcile_context(&req)?;
    let prepared = self.prepare(&mut context, req.build_only).await?;

    builder
      .build(&BuildRequest {
        project_dir: context.project_dir.clone(),
        project_name: context.compose_project.clone(),
        template_path: context.template_path.clone(),
        env: context.env.clone(),
        mode: context.mode.clone(),
        output_dir: req.output_dir.clone(),
        parameters: req.parameters.clone(),
        image_sources: req.image_sources.clone(),
        image_runtimes: req.image_runtimes.clone(),
        tag: req.tag.clone(),
        no_cache: req.no_cache,
        verbose: req.verbose,
        build_images: req.build_images,
        bundle: req.bundle_manifest,
        runtime_env: prepared.env.clone(),
      })
      .await?;

    let artifact_path = req
      .artifact_path
      .clone()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or_else(|| staging::default_artifact_path(&context.project_dir, &context.compose_project, &context.env));
    write_generated_manifest(
      &artifact_path,
      &GeneratedArtifact {
        project: &context.compose_project,
        env: &context.env,
        mode: &context.mode,
        template_path: &context.template_path,
        output_dir: &req.output_dir,
        parameters: &req.parameters,
        bundle_manifest: req.bundle_manifest,
        prewarm,
      },
    )?;

    match staging::template_config_dir(&context.template_path, &req.output_dir, &context.env) {
      Ok(dir) => summary::report_template_delta(self.ui.as_ref(), &dir, &prepared.before),
      Err(e) => self.ui.warn(&format!("failed to resolve template config dir: {}", e)),
    }

    if req.build_only {
      self.ui.success("Build complete");
      return Ok(());
    }

    self.provision(&context, &req, prewarm, &artifact_path, prepared).await?;
    self.ui.success("Deploy complete");
    Ok(())
  }

  /// Land an artifact generated elsewhere.
  pub async fn apply(&self, req: DeployRequest) -> Result<(), DeployError> {
    let prewarm = PrewarmMode::parse(&req.image_prewarm)?;
    let artifact_path = req
      .artifact_path
      .clone()
      .filter(|p| !p.as_os_str().is_empty())
      .ok_or(ArtifactError::PathRequired)?;
    let mut context = reconcile_context(&req)?;
    for (field, value) in [
      ("template path", &context.template_path),
      ("compose project", &context.compose_project),
      ("env", &context.env),
    ] {
      if value.trim().is_empty() {
        return Err(DeployError::Required(field));
      }
    }

    let prepared = self.prepare(&mut context, false).await?;
    self.provision(&context, &req, prewarm, &artifact_path, prepared).await?;
    self.ui.success("Deploy complete");
    Ok(())
  }

  async fn align(&self, context: &mut DeployContext) -> GatewayRuntimeInfo {
    if self.settings.skip_gateway_align {
      debug!("gateway alignment skipped");
      return GatewayRuntimeInfo::default();
    }
    match &self.fleet {
      Some(fleet) => align_gateway(fleet.as_ref(), context, self.ui.as_ref()).await,
      None => GatewayRuntimeInfo::default(),
    }
  }

  /// Align, resolve the runtime env and, unless building only, wait for the registry.
  async fn prepare(&self, context: &mut DeployContext, build_only: bool) -> Result<Prepared, DeployError> {
    let gateway = self.align(context).await;
    let staging_dir =
      staging::staging_config_dir(&self.settings, &context.template_path, &context.compose_project, &context.env);
    let env = RuntimeEnv::resolve(context, &gateway, &self.settings, &staging_dir);
    if let Some(applier) = &self.env_applier {
      applier.apply(&env)?;
    }

    if !build_only {
      let address = self.settings.registry_address();
      info!(registry = %address, "waiting for registry");
      self
        .waiter
        .wait(&address, self.settings.registry_timeout)
        .await
        .map_err(DeployError::RegistryNotReady)?;
      self
        .provisioner
        .check_services_status(&context.compose_project, &context.mode)
        .await;
    }
    let before = summary::snapshot_staging(self.ui.as_ref(), &staging_dir);
    Ok(Prepared {
      env,
      staging_dir,
      before,
    })
  }

  async fn provision(
    &self,
    context: &DeployContext,
    req: &DeployRequest,
    prewarm: PrewarmMode,
    artifact_path: &Path,
    prepared: Prepared,
  ) -> Result<(), DeployError> {
    let ui = self.ui.as_ref();
    let (observation, warnings) =
      resolve_runtime_observation(self.fleet.as_deref(), &context.compose_project, &context.mode, &req.tag).await;
    for warning in &warnings {
      ui.warn(warning);
    }

    let report = apply_artifact(&ApplyArtifactRequest {
      artifact_path: artifact_path.to_path_buf(),
      output_dir: prepared.staging_dir.clone(),
      secret_env_path: req.secret_env_path.clone(),
      runtime: Some(observation),
    })?;
    for warning in &report.warnings {
      ui.warn(warning);
    }
    info!(entries = report.entries, staging = %prepared.staging_dir.display(), "artifact applied");
    summary::report_merge(ui, &prepared.staging_dir, &prepared.before);

    if let Some(images) = read_image_import(&prepared.staging_dir.join(IMAGE_IMPORT_FILE))?
      && !images.is_empty()
    {
      match prewarm {
        PrewarmMode::Off => return Err(DeployError::PrewarmRequired),
        PrewarmMode::All => {
          prewarm_images(self.runner.as_ref(), &self.settings.docker, &images, ui, req.verbose).await?;
        }
      }
    }

    if let Some(fleet) = &self.fleet {
      propagate_runtime_config(
        fleet.as_ref(),
        self.runner.as_ref(),
        &self.settings.docker,
        &context.compose_project,
        &prepared.staging_dir,
      )
      .await?;
    }

    self
      .provisioner
      .run_provisioner(&ProvisionRequest {
        project: context.compose_project.clone(),
        mode: context.mode.clone(),
        no_deps: req.no_deps,
        verbose: req.verbose,
        project_dir: context.project_dir.clone(),
        compose_files: req.compose_files.clone(),
        env: prepared.env,
      })
      .await
      .map_err(DeployError::Provisioner)
  }
}
