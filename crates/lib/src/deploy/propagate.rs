//! Runtime config propagation.
//!
//! After the staging dir has been updated, the rendered runtime config has to reach the
//! gateway's `/app/runtime-config` mount. Depending on how the fleet was started that mount is
//! a host bind mount, a named volume, or something only reachable through `docker cp`.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{
  COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL, RUNTIME_CONFIG_FILES, RUNTIME_CONFIG_MOUNT_PATH, services,
};
use crate::exec::{CommandError, CommandRunner, Invocation};
use crate::fleet::{ContainerFilter, ContainerSummary, FleetClient, FleetError, MountKind};
use crate::util::fs::{copy_file_atomic, same_path};

/// Where the gateway reads its runtime config from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeConfigTarget {
  /// Host directory bind-mounted into the container.
  Bind(PathBuf),
  /// Named volume, with the container that mounts it when known.
  Volume { name: String, container: Option<String> },
  /// Only the container id is known.
  Container(String),
}

/// A copy channel tried during propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
  Container,
  Volume,
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Channel::Container => f.write_str("container copy"),
      Channel::Volume => f.write_str("volume copy"),
    }
  }
}

/// Every copy channel failed. Attempts are kept in the order they were tried.
#[derive(Debug, Error)]
#[error("sync runtime config failed: {}", describe(attempts))]
pub struct PropagationError {
  pub attempts: Vec<(Channel, CommandError)>,
}

fn describe(attempts: &[(Channel, CommandError)]) -> String {
  attempts
    .iter()
    .map(|(channel, err)| format!("{}: {}", channel, err))
    .collect::<Vec<_>>()
    .join("; ")
}

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("resolve runtime config target: {0}")]
  Target(FleetError),

  #[error("copy runtime config to {}: {source}", path.display())]
  Copy { path: PathBuf, source: std::io::Error },

  /// The only channel available for the target failed.
  #[error(transparent)]
  Command(CommandError),

  #[error(transparent)]
  Propagation(#[from] PropagationError),
}

fn service_priority(container: &ContainerSummary) -> u8 {
  match container.label(COMPOSE_SERVICE_LABEL).map(str::trim) {
    Some(services::GATEWAY) => 0,
    _ => 1,
  }
}

/// Find the runtime config mount of `project`.
///
/// Containers are searched gateway first, then running ones, then by name. The first one
/// that mounts `/app/runtime-config` decides the target.
pub async fn resolve_runtime_config_target(
  fleet: &dyn FleetClient,
  project: &str,
) -> Result<Option<RuntimeConfigTarget>, FleetError> {
  let filter = ContainerFilter::default().label(COMPOSE_PROJECT_LABEL, project).all();
  let mut containers = fleet.list_containers(&filter).await?;
  containers.sort_by(|a, b| {
    service_priority(a)
      .cmp(&service_priority(b))
      .then_with(|| b.is_running().cmp(&a.is_running()))
      .then_with(|| a.primary_name().cmp(b.primary_name()))
  });

  for container in &containers {
    let mut mounted = false;
    for mount in container.mounts.iter().filter(|m| m.destination == RUNTIME_CONFIG_MOUNT_PATH) {
      mounted = true;
      match mount.kind {
        MountKind::Bind => return Ok(Some(RuntimeConfigTarget::Bind(PathBuf::from(&mount.source)))),
        MountKind::Volume if !mount.name.is_empty() => {
          return Ok(Some(RuntimeConfigTarget::Volume {
            name: mount.name.clone(),
            container: Some(container.id.clone()),
          }));
        }
        MountKind::Volume if !mount.source.is_empty() => {
          return Ok(Some(RuntimeConfigTarget::Bind(PathBuf::from(&mount.source))));
        }
        _ => {}
      }
    }
    if mounted {
      return Ok(Some(RuntimeConfigTarget::Container(container.id.clone())));
    }
  }
  Ok(None)
}

fn existing_files(staging_dir: &Path) -> impl Iterator<Item = (&'static str, PathBuf)> + '_ {
  RUNTIME_CONFIG_FILES
    .iter()
    .map(move |name| (*name, staging_dir.join(name)))
    .filter(|(_, path)| path.is_file())
}

async fn copy_to_container(
  runner: &dyn CommandRunner,
  docker: &str,
  staging_dir: &Path,
  container: &str,
) -> Result<(), CommandError> {
  for (name, src) in existing_files(staging_dir) {
    let dest = format!("{}:{}/{}", container, RUNTIME_CONFIG_MOUNT_PATH, name);
    runner
      .run(&Invocation::new(docker).arg("cp").arg(src.to_string_lossy()).arg(dest))
      .await?;
  }
  Ok(())
}

async fn copy_to_volume(
  runner: &dyn CommandRunner,
  docker: &str,
  staging_dir: &Path,
  volume: &str,
) -> Result<(), CommandError> {
  let script = format!(
    "mkdir -p {dir} && for f in {files}; do if [ -f \"/src/${{f}}\" ]; then cp -f \"/src/${{f}}\" \"{dir}/${{f}}\"; fi; done",
    dir = RUNTIME_CONFIG_MOUNT_PATH,
    files = RUNTIME_CONFIG_FILES.join(" "),
  );
  let invocation = Invocation::new(docker)
    .args(["run", "--rm", "-v"])
    .arg(format!("{}:{}", volume, RUNTIME_CONFIG_MOUNT_PATH))
    .arg("-v")
    .arg(format!("{}:/src:ro", staging_dir.to_string_lossy()))
    .args(["alpine", "sh", "-c"])
    .arg(script);
  runner.run(&invocation).await
}

/// Copy the staged runtime config files to `target`.
///
/// A bind target that already is the staging dir needs no work. Otherwise container copy is
/// tried before volume copy. When both were tried and failed the error lists both attempts;
/// a single failed channel returns its own error.
pub async fn sync_runtime_config(
  runner: &dyn CommandRunner,
  docker: &str,
  staging_dir: &Path,
  target: &RuntimeConfigTarget,
) -> Result<(), SyncError> {
  let (container, volume) = match target {
    RuntimeConfigTarget::Bind(path) => {
      if same_path(path, staging_dir) {
        debug!(path = %path.display(), "runtime config already mounted from staging");
        return Ok(());
      }
      for (name, src) in existing_files(staging_dir) {
        let dest = path.join(name);
        copy_file_atomic(&src, &dest).map_err(|source| SyncError::Copy { path: dest, source })?;
      }
      info!(path = %path.display(), "runtime config copied to bind mount");
      return Ok(());
    }
    RuntimeConfigTarget::Volume { name, container } => (container.as_deref(), Some(name.as_str())),
    RuntimeConfigTarget::Container(id) => (Some(id.as_str()), None),
  };

  let mut attempts = Vec::new();
  if let Some(id) = container {
    match copy_to_container(runner, docker, staging_dir, id).await {
      Ok(()) => {
        info!(container = %id, "runtime config copied into container");
        return Ok(());
      }
      Err(e) => attempts.push((Channel::Container, e)),
    }
  }
  if let Some(name) = volume {
    match copy_to_volume(runner, docker, staging_dir, name).await {
      Ok(()) => {
        info!(volume = %name, "runtime config copied into volume");
        return Ok(());
      }
      Err(e) => attempts.push((Channel::Volume, e)),
    }
  }
  if attempts.len() > 1 {
    return Err(PropagationError { attempts }.into());
  }
  match attempts.pop() {
    Some((_, err)) => Err(SyncError::Command(err)),
    None => Ok(()),
  }
}

/// Resolve the target of `project` and sync `staging_dir` into it.
///
/// No project, no staging dir or no mounted target all mean there is nothing to do.
pub async fn propagate_runtime_config(
  fleet: &dyn FleetClient,
  runner: &dyn CommandRunner,
  docker: &str,
  project: &str,
  staging_dir: &Path,
) -> Result<(), SyncError> {
  if project.trim().is_empty() || !staging_dir.is_dir() {
    return Ok(());
  }
  match resolve_runtime_config_target(fleet, project.trim())
    .await
    .map_err(SyncError::Target)?
  {
    Some(target) => sync_runtime_config(runner, docker, staging_dir, &target).await,
    None => {
      debug!(project = %project, "no runtime config mount found");
      Ok(())
    }
  }
}
