//! Compose-based provisioner.
//!
//! Resources (tables, buckets, layers) are created by a one-shot `provisioner` service of the
//! compose project, run with `docker compose ... run --rm provisioner`. The hard part is
//! choosing the same compose files the live project was started from.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use super::RuntimeEnv;
use crate::consts::{COMPOSE_CONFIG_FILES_LABEL, COMPOSE_PROJECT_LABEL, COMPOSE_WORKING_DIR_LABEL, services};
use crate::exec::{CommandError, CommandRunner, Invocation};
use crate::fleet::{ContainerFilter, FleetClient, FleetError};
use crate::ui::UserInterface;
use crate::util::fs::normalize_lexical;

const REQUIRED_SERVICES: [&str; 4] = [
  services::PROVISIONER,
  services::DATABASE,
  services::S3_STORAGE,
  services::VICTORIALOGS,
];

/// Agent service of an execution mode.
pub fn agent_service(mode: &str) -> &'static str {
  if mode.trim().eq_ignore_ascii_case("containerd") {
    services::RUNTIME_NODE
  } else {
    services::AGENT
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionRequest {
  pub project: String,
  pub mode: String,
  pub no_deps: bool,
  pub verbose: bool,
  pub project_dir: PathBuf,
  /// Explicit compose files, relative to `project_dir` unless absolute.
  pub compose_files: Vec<String>,
  pub env: RuntimeEnv,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error("compose override files not found: {}", files.join(", "))]
  OverridesNotFound { files: Vec<String> },

  #[error("compose override missing services: {}", services.join(", "))]
  OverrideMissingServices { services: Vec<String> },

  #[error("compose config missing services: {}", services.join(", "))]
  ConfigMissingServices { services: Vec<String> },

  #[error("run provisioner: {0}")]
  Run(CommandError),
}

/// Provisions resources and reports on service liveness.
#[async_trait]
pub trait Provisioner: Send + Sync {
  async fn run_provisioner(&self, request: &ProvisionRequest) -> Result<(), ProvisionError>;

  /// Warn when the gateway or the mode's agent is not running. Never fails.
  async fn check_services_status(&self, project: &str, mode: &str);
}

/// Compose files recovered from a running project's labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectComposeFiles {
  pub files: Vec<String>,
  pub missing: Vec<String>,
  /// Number of distinct file sets seen across the project's containers.
  pub set_count: usize,
}

fn join_path(dir: &str, file: &str) -> String {
  if Path::new(file).is_absolute() || dir.is_empty() {
    return normalize_lexical(file);
  }
  normalize_lexical(&Path::new(dir).join(file).to_string_lossy())
}

/// Recover the compose files `project` was started from.
///
/// Running containers are preferred. When containers disagree the most common set wins;
/// ties go to the lexically first set.
pub async fn resolve_project_compose_files(
  fleet: &dyn FleetClient,
  project: &str,
) -> Result<ProjectComposeFiles, FleetError> {
  let project = project.trim();
  if project.is_empty() {
    return Ok(ProjectComposeFiles::default());
  }
  let filter = ContainerFilter::default().label(COMPOSE_PROJECT_LABEL, project).all();
  let containers = fleet.list_containers(&filter).await?;
  let running: Vec<_> = containers.iter().filter(|c| c.is_running()).collect();
  let candidates = if running.is_empty() {
    containers.iter().collect()
  } else {
    running
  };

  let mut sets: BTreeMap<String, (Vec<String>, usize)> = BTreeMap::new();
  for container in candidates {
    let raw = container.label(COMPOSE_CONFIG_FILES_LABEL).unwrap_or_default();
    let working_dir = container.label(COMPOSE_WORKING_DIR_LABEL).unwrap_or_default().trim();
    let mut files: Vec<String> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
      let path = join_path(working_dir, part);
      if !files.contains(&path) {
        files.push(path);
      }
    }
    if files.is_empty() {
      continue;
    }
    sets.entry(files.join("\u{1f}")).or_insert_with(|| (files, 0)).1 += 1;
  }

  let mut best: Option<&(Vec<String>, usize)> = None;
  for set in sets.values() {
    if best.is_none_or(|b| set.1 > b.1) {
      best = Some(set);
    }
  }
  let Some((files, _)) = best else {
    return Ok(ProjectComposeFiles::default());
  };

  let (files, missing): (Vec<String>, Vec<String>) = files.iter().cloned().partition(|f| Path::new(f).exists());
  Ok(ProjectComposeFiles {
    files,
    missing,
    set_count: sets.len(),
  })
}

/// [`Provisioner`] driving `docker compose`.
pub struct ComposeProvisioner {
  runner: Arc<dyn CommandRunner>,
  fleet: Option<Arc<dyn FleetClient>>,
  docker: String,
  ui: Arc<dyn UserInterface>,
}

impl ComposeProvisioner {
  pub fn new(
    runner: Arc<dyn CommandRunner>,
    fleet: Option<Arc<dyn FleetClient>>,
    docker: impl Into<String>,
    ui: Arc<dyn UserInterface>,
  ) -> Self {
    Self {
      runner,
      fleet,
      docker: docker.into(),
      ui,
    }
  }

  fn compose(&self, files: &[String]) -> Invocation {
    let mut invocation = Invocation::new(&self.docker).arg("compose");
    for file in files {
      invocation = invocation.arg("-f").arg(file);
    }
    invocation
  }

  async fn project_files(&self, project: &str) -> Result<ProjectComposeFiles, FleetError> {
    match &self.fleet {
      Some(fleet) => resolve_project_compose_files(fleet.as_ref(), project).await,
      None => Ok(ProjectComposeFiles::default()),
    }
  }

  async fn is_service_running(&self, project: &str, service: &str) -> bool {
    let files = self.project_files(project).await.map(|r| r.files).unwrap_or_default();
    let mut invocation = self.compose(&files);
    if !project.trim().is_empty() {
      invocation = invocation.args(["-p", project.trim()]);
    }
    match self.runner.run_output(&invocation.args(["ps", "-q", service])).await {
      Ok(out) => !String::from_utf8_lossy(&out).trim().is_empty(),
      Err(e) => {
        debug!(service = %service, error = %e, "service status check failed");
        false
      }
    }
  }

  /// Required services the compose files do not declare. All of them when the config cannot
  /// be read.
  async fn missing_services(&self, dir: &Path, project: &str, files: &[String]) -> Vec<String> {
    let mut invocation = self.compose(files);
    if !project.trim().is_empty() {
      invocation = invocation.args(["-p", project.trim()]);
    }
    let invocation = invocation
      .args(["--profile", "deploy", "config", "--services"])
      .current_dir(dir);
    let declared: BTreeSet<String> = match self.runner.run_output(&invocation).await {
      Ok(out) => String::from_utf8_lossy(&out)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect(),
      Err(e) => {
        debug!(error = %e, "compose config --services failed");
        BTreeSet::new()
      }
    };
    REQUIRED_SERVICES
      .iter()
      .filter(|s| !declared.contains(**s))
      .map(|s| s.to_string())
      .collect()
  }

  async fn select_files(&self, request: &ProvisionRequest) -> Result<Vec<String>, ProvisionError> {
    let dir = request.project_dir.to_string_lossy().into_owned();

    if !request.compose_files.is_empty() {
      let (existing, missing): (Vec<String>, Vec<String>) = request
        .compose_files
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(|f| join_path(&dir, f))
        .partition(|f| Path::new(f).exists());
      if !missing.is_empty() || existing.is_empty() {
        return Err(ProvisionError::OverridesNotFound { files: missing });
      }
      let services = self.missing_services(&request.project_dir, &request.project, &existing).await;
      if !services.is_empty() {
        return Err(ProvisionError::OverrideMissingServices { services });
      }
      return Ok(existing);
    }

    let recovered = match self.project_files(&request.project).await {
      Ok(recovered) => recovered,
      Err(e) => {
        self.ui.warn(&format!("failed to resolve compose config files: {}", e));
        ProjectComposeFiles::default()
      }
    };
    if recovered.set_count > 1 {
      self.ui.warn("multiple compose config sets detected; using the most common one.");
    }
    if !recovered.missing.is_empty() {
      self.ui.warn(&format!(
        "compose config files not found: {}",
        recovered.missing.join(", ")
      ));
    }

    let files = if recovered.files.is_empty() {
      default_compose_files(&request.project_dir, &request.mode)
    } else {
      recovered.files
    };
    let services = self.missing_services(&request.project_dir, &request.project, &files).await;
    if !services.is_empty() {
      return Err(ProvisionError::ConfigMissingServices { services });
    }
    Ok(files)
  }

  async fn supports_no_warn_orphans(&self, dir: &Path) -> bool {
    let invocation = Invocation::new(&self.docker).args(["compose", "--help"]).current_dir(dir);
    match self.runner.run_output(&invocation).await {
      Ok(out) => String::from_utf8_lossy(&out).contains("--no-warn-orphans"),
      Err(_) => false,
    }
  }
}

/// `docker-compose.<mode>.yml` plus the mode's proxy overlay when present.
pub fn default_compose_files(project_dir: &Path, mode: &str) -> Vec<String> {
  let mode = if mode.trim().eq_ignore_ascii_case("containerd") {
    "containerd"
  } else {
    "docker"
  };
  let mut files = vec![project_dir.join(format!("docker-compose.{}.yml", mode))];
  let proxy = project_dir.join(format!("docker-compose.proxy.{}.yml", mode));
  if proxy.exists() {
    files.push(proxy);
  }
  files.iter().map(|f| f.to_string_lossy().into_owned()).collect()
}

#[async_trait]
impl Provisioner for ComposeProvisioner {
  async fn run_provisioner(&self, request: &ProvisionRequest) -> Result<(), ProvisionError> {
    let files = self.select_files(request).await?;

    let mut invocation = self.compose(&files);
    if self.supports_no_warn_orphans(&request.project_dir).await {
      invocation = invocation.arg("--no-warn-orphans");
    }
    invocation = invocation.args(["--profile", "deploy"]);
    if !request.project.trim().is_empty() {
      invocation = invocation.args(["-p", request.project.trim()]);
    }
    invocation = invocation.args(["run", "--rm"]);
    if request.no_deps {
      invocation = invocation.arg("--no-deps");
    }
    let invocation = invocation
      .arg(services::PROVISIONER)
      .current_dir(&request.project_dir)
      .envs(request.env.iter());

    info!(project = %request.project, files = files.len(), "running provisioner");
    let result = if request.verbose {
      self.runner.run(&invocation).await
    } else {
      self.runner.run_quiet(&invocation).await
    };
    result.map_err(ProvisionError::Run)
  }

  async fn check_services_status(&self, project: &str, mode: &str) {
    if !self.is_service_running(project, services::GATEWAY).await {
      self
        .ui
        .warn("Gateway is not running. Deploy will continue but functions may not be immediately available.");
    }
    let agent = agent_service(mode);
    if !self.is_service_running(project, agent).await {
      self.ui.warn(&format!(
        "{} is not running. Deploy will continue but function execution may fail.",
        agent
      ));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeFleet, FakeRunner, RecordingUi, RunKind, container};
  use std::fs;
  use tempfile::TempDir;

  const ALL_SERVICES: &str = "gateway\nprovisioner\ndatabase\ns3-storage\nvictorialogs\n";

  struct Harness {
    runner: Arc<FakeRunner>,
    ui: Arc<RecordingUi>,
    provisioner: ComposeProvisioner,
  }

  fn harness(fleet: Option<FakeFleet>) -> Harness {
    let runner = Arc::new(FakeRunner::new());
    let ui = Arc::new(RecordingUi::default());
    let fleet = fleet.map(|f| Arc::new(f) as Arc<dyn FleetClient>);
    let provisioner = ComposeProvisioner::new(runner.clone(), fleet, "docker", ui.clone());
    Harness { runner, ui, provisioner }
  }

  fn request(dir: &Path, files: &[&str]) -> ProvisionRequest {
    let mut env = RuntimeEnv::default();
    env.set("ENV", "dev");
    ProvisionRequest {
      project: "edge".into(),
      mode: "docker".into(),
      no_deps: true,
      verbose: false,
      project_dir: dir.to_path_buf(),
      compose_files: files.iter().map(|f| f.to_string()).collect(),
      env,
    }
  }

  #[test]
  fn agent_depends_on_mode() {
    assert_eq!(agent_service("docker"), "agent");
    assert_eq!(agent_service("containerd"), "runtime-node");
  }

  #[tokio::test]
  async fn override_files_build_the_run_command() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("compose.yml"), "services: {}\n").unwrap();
    let h = harness(None);
    h.runner.respond("config --services", ALL_SERVICES);
    h.runner.respond("compose --help", "  --no-warn-orphans  Do not warn about orphans\n");

    h.provisioner
      .run_provisioner(&request(dir.path(), &["compose.yml"]))
      .await
      .unwrap();

    let compose_file = normalize_lexical(&dir.path().join("compose.yml").to_string_lossy());
    let calls = h.runner.calls();
    let (kind, last) = calls.last().unwrap();
    assert_eq!(*kind, RunKind::Quiet);
    assert_eq!(
      last.to_string(),
      format!(
        "docker compose -f {} --no-warn-orphans --profile deploy -p edge run --rm --no-deps provisioner",
        compose_file
      )
    );
    assert_eq!(last.current_dir.as_deref(), Some(dir.path()));
    assert_eq!(last.env.get("ENV").map(String::as_str), Some("dev"));
  }

  #[tokio::test]
  async fn missing_override_files_fail() {
    let dir = TempDir::new().unwrap();
    let h = harness(None);
    let err = h
      .provisioner
      .run_provisioner(&request(dir.path(), &["missing.yml"]))
      .await
      .unwrap_err();
    assert!(err.to_string().starts_with("compose override files not found: "));
    assert!(err.to_string().ends_with("missing.yml"));
    assert!(h.runner.calls().is_empty());
  }

  #[tokio::test]
  async fn overrides_must_declare_required_services() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("compose.yml"), "services: {}\n").unwrap();
    let h = harness(None);
    h.runner.respond("config --services", "provisioner\ndatabase\n");

    let err = h
      .provisioner
      .run_provisioner(&request(dir.path(), &["compose.yml"]))
      .await
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      "compose override missing services: s3-storage, victorialogs"
    );
  }

  #[tokio::test]
  async fn defaults_follow_mode_and_verbose_inherits_output() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("docker-compose.proxy.containerd.yml"), "").unwrap();
    let h = harness(None);
    h.runner.respond("config --services", ALL_SERVICES);
    let mut req = request(dir.path(), &[]);
    req.mode = "containerd".into();
    req.verbose = true;
    req.no_deps = false;

    h.provisioner.run_provisioner(&req).await.unwrap();

    let calls = h.runner.calls();
    let (kind, last) = calls.last().unwrap();
    assert_eq!(*kind, RunKind::Run);
    let rendered = last.to_string();
    assert!(rendered.contains("docker-compose.containerd.yml -f "));
    assert!(rendered.ends_with("docker-compose.proxy.containerd.yml --profile deploy -p edge run --rm provisioner"));
  }

  #[tokio::test]
  async fn recovers_most_common_file_set_from_labels() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.yml"), "").unwrap();
    let working_dir = dir.path().to_string_lossy().into_owned();
    let labelled = |id: &str, files: &str| {
      let mut c = container(id, "edge", id, true);
      c.labels.insert(COMPOSE_CONFIG_FILES_LABEL.into(), files.into());
      c.labels.insert(COMPOSE_WORKING_DIR_LABEL.into(), working_dir.clone());
      c
    };
    let fleet = FakeFleet::with(vec![
      labelled("gateway", "a.yml,gone.yml"),
      labelled("database", "a.yml, gone.yml"),
      labelled("agent", "other.yml"),
    ]);
    let h = harness(Some(fleet));
    h.runner.respond("config --services", ALL_SERVICES);

    h.provisioner.run_provisioner(&request(dir.path(), &[])).await.unwrap();

    let a = normalize_lexical(&dir.path().join("a.yml").to_string_lossy());
    let gone = normalize_lexical(&dir.path().join("gone.yml").to_string_lossy());
    assert_eq!(
      h.ui.warnings(),
      vec![
        "multiple compose config sets detected; using the most common one.".to_string(),
        format!("compose config files not found: {}", gone),
      ]
    );
    let last = h.runner.commands().pop().unwrap();
    assert!(last.starts_with(&format!("docker compose -f {} --profile deploy", a)));
  }

  #[tokio::test]
  async fn provisioner_failure_is_wrapped() {
    let dir = TempDir::new().unwrap();
    let h = harness(None);
    h.runner.respond("config --services", ALL_SERVICES);
    h.runner.fail("run --rm", "table creation failed");

    let err = h
      .provisioner
      .run_provisioner(&request(dir.path(), &[]))
      .await
      .unwrap_err();
    assert!(err.to_string().starts_with("run provisioner: docker compose"));
    assert!(err.to_string().ends_with("table creation failed"));
  }

  #[tokio::test]
  async fn status_check_warns_for_stopped_services() {
    let h = harness(None);
    h.runner.respond("ps -q gateway", "f00d\n");

    h.provisioner.check_services_status("edge", "containerd").await;

    assert_eq!(
      h.ui.warnings(),
      vec!["runtime-node is not running. Deploy will continue but function execution may fail."]
    );
    assert!(h.runner.commands()[0].ends_with("compose -p edge ps -q gateway"));
  }
}
