//! In-memory fakes for the collaborator traits, shared by the crate's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::deploy::{
  BuildError, BuildRequest, Builder, ProvisionError, ProvisionRequest, Provisioner, RegistryWaiter, WaitError,
  staging,
};
use crate::exec::{CommandError, CommandRunner, Invocation};
use crate::fleet::{
  ContainerDetail, ContainerFilter, ContainerSummary, FleetClient, FleetError, MountKind, MountPoint, PruneKind,
  PruneReport,
};
use crate::ui::{KeyValue, UserInterface};

/// How a [`FakeRunner`] call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
  Run,
  Output,
  Quiet,
}

#[derive(Debug, Clone)]
enum Reply {
  Stdout(Vec<u8>),
  Fail { code: i32, output: String },
}

/// Records every invocation and answers from scripted replies.
///
/// A reply applies to every invocation whose rendered command line contains its pattern; the
/// first registered match wins. Unmatched invocations succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
  calls: Mutex<Vec<(RunKind, Invocation)>>,
  replies: Mutex<Vec<(String, Reply)>>,
}

impl FakeRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, pattern: &str, stdout: impl Into<Vec<u8>>) {
    self
      .replies
      .lock()
      .unwrap()
      .push((pattern.to_string(), Reply::Stdout(stdout.into())));
  }

  pub fn fail(&self, pattern: &str, output: &str) {
    self.replies.lock().unwrap().push((
      pattern.to_string(),
      Reply::Fail {
        code: 1,
        output: output.to_string(),
      },
    ));
  }

  pub fn calls(&self) -> Vec<(RunKind, Invocation)> {
    self.calls.lock().unwrap().clone()
  }

  /// Rendered command lines in call order.
  pub fn commands(&self) -> Vec<String> {
    self.calls().iter().map(|(_, inv)| inv.to_string()).collect()
  }

  fn answer(&self, kind: RunKind, invocation: &Invocation) -> Result<Vec<u8>, CommandError> {
    self.calls.lock().unwrap().push((kind, invocation.clone()));
    let rendered = invocation.to_string();
    let replies = self.replies.lock().unwrap();
    match replies.iter().find(|(pattern, _)| rendered.contains(pattern.as_str())) {
      Some((_, Reply::Stdout(out))) => Ok(out.clone()),
      Some((_, Reply::Fail { code, output })) => Err(CommandError::Failed {
        command: rendered,
        code: Some(*code),
        output: output.clone(),
      }),
      None => Ok(Vec::new()),
    }
  }
}

#[async_trait]
impl CommandRunner for FakeRunner {
  async fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
    self.answer(RunKind::Run, invocation).map(|_| ())
  }

  async fn run_output(&self, invocation: &Invocation) -> Result<Vec<u8>, CommandError> {
    self.answer(RunKind::Output, invocation)
  }

  async fn run_quiet(&self, invocation: &Invocation) -> Result<(), CommandError> {
    self.answer(RunKind::Quiet, invocation).map(|_| ())
  }
}

/// A static fleet. `list_containers` honors label filters and the `all` flag.
#[derive(Default)]
pub struct FakeFleet {
  pub containers: Vec<ContainerSummary>,
  pub details: HashMap<String, ContainerDetail>,
  pub fail_list: bool,
  pub fail_inspect: bool,
  filters: Mutex<Vec<ContainerFilter>>,
  prunes: Mutex<Vec<(PruneKind, Vec<(String, String)>)>>,
}

impl FakeFleet {
  pub fn with(containers: Vec<ContainerSummary>) -> Self {
    Self {
      containers,
      ..Self::default()
    }
  }

  /// A fleet whose every listing fails.
  pub fn unreachable() -> Self {
    Self {
      fail_list: true,
      ..Self::default()
    }
  }

  pub fn detail(mut self, id: &str, env: &[&str], networks: &[&str]) -> Self {
    self.details.insert(
      id.to_string(),
      ContainerDetail {
        id: id.to_string(),
        env: env.iter().map(|s| s.to_string()).collect(),
        networks: networks.iter().map(|s| s.to_string()).collect(),
      },
    );
    self
  }

  pub fn list_filters(&self) -> Vec<ContainerFilter> {
    self.filters.lock().unwrap().clone()
  }

  pub fn prune_calls(&self) -> Vec<(PruneKind, Vec<(String, String)>)> {
    self.prunes.lock().unwrap().clone()
  }
}

#[async_trait]
impl FleetClient for FakeFleet {
  async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>, FleetError> {
    self.filters.lock().unwrap().push(filter.clone());
    if self.fail_list {
      return Err(FleetError::Command(CommandError::Failed {
        command: "docker ps".into(),
        code: Some(1),
        output: "Cannot connect to the Docker daemon".into(),
      }));
    }
    Ok(
      self
        .containers
        .iter()
        .filter(|c| filter.all || c.is_running())
        .filter(|c| filter.labels.iter().all(|(k, v)| c.label(k) == Some(v.as_str())))
        .cloned()
        .collect(),
    )
  }

  async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, FleetError> {
    if self.fail_inspect {
      return Err(FleetError::NotFound(id.to_string()));
    }
    self
      .details
      .get(id)
      .cloned()
      .ok_or_else(|| FleetError::NotFound(id.to_string()))
  }

  async fn prune(&self, kind: PruneKind, labels: &[(String, String)]) -> Result<PruneReport, FleetError> {
    self.prunes.lock().unwrap().push((kind, labels.to_vec()));
    Ok(PruneReport {
      reclaimed: Some("0B".into()),
    })
  }
}

/// Builder for fake compose containers.
pub fn container(id: &str, project: &str, service: &str, running: bool) -> ContainerSummary {
  ContainerSummary {
    id: id.to_string(),
    names: vec![format!("{}-{}-1", project, service)],
    image: format!("edgebox/{}:latest", service),
    state: if running { "running" } else { "exited" }.to_string(),
    labels: [
      (crate::consts::COMPOSE_PROJECT_LABEL.to_string(), project.to_string()),
      (crate::consts::COMPOSE_SERVICE_LABEL.to_string(), service.to_string()),
    ]
    .into_iter()
    .collect(),
    networks: Vec::new(),
    mounts: Vec::new(),
  }
}

pub fn mount(kind: MountKind, name: &str, source: &str, destination: &str) -> MountPoint {
  MountPoint {
    kind,
    name: name.to_string(),
    source: source.to_string(),
    destination: destination.to_string(),
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
  Info(String),
  Warn(String),
  Success(String),
  Block {
    icon: String,
    title: String,
    rows: Vec<KeyValue>,
  },
}

#[derive(Default)]
pub struct RecordingUi {
  events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
  pub fn events(&self) -> Vec<UiEvent> {
    self.events.lock().unwrap().clone()
  }

  pub fn warnings(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        UiEvent::Warn(m) => Some(m),
        _ => None,
      })
      .collect()
  }

  pub fn infos(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        UiEvent::Info(m) => Some(m),
        _ => None,
      })
      .collect()
  }

  pub fn successes(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        UiEvent::Success(m) => Some(m),
        _ => None,
      })
      .collect()
  }

  pub fn block_titles(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        UiEvent::Block { title, .. } => Some(title),
        _ => None,
      })
      .collect()
  }

  /// Rows of the most recent block titled `title`, as `(key, value)` pairs.
  pub fn last_block_rows(&self, title: &str) -> Vec<(String, String)> {
    self
      .events()
      .into_iter()
      .rev()
      .find_map(|e| match e {
        UiEvent::Block { title: t, rows, .. } if t == title => {
          Some(rows.into_iter().map(|r| (r.key, r.value)).collect())
        }
        _ => None,
      })
      .unwrap_or_default()
  }
}

impl UserInterface for RecordingUi {
  fn info(&self, message: &str) {
    self.events.lock().unwrap().push(UiEvent::Info(message.to_string()));
  }

  fn warn(&self, message: &str) {
    self.events.lock().unwrap().push(UiEvent::Warn(message.to_string()));
  }

  fn success(&self, message: &str) {
    self.events.lock().unwrap().push(UiEvent::Success(message.to_string()));
  }

  fn block(&self, icon: &str, title: &str, rows: &[KeyValue]) {
    self.events.lock().unwrap().push(UiEvent::Block {
      icon: icon.to_string(),
      title: title.to_string(),
      rows: rows.to_vec(),
    });
  }
}

/// Records build requests and writes canned files into the generation output.
#[derive(Default)]
pub struct FakeBuilder {
  requests: Mutex<Vec<BuildRequest>>,
  /// Files written relative to the generated config dir.
  pub files: Vec<(String, String)>,
  pub fail: Option<String>,
}

impl FakeBuilder {
  pub fn writing(files: &[(&str, &str)]) -> Self {
    Self {
      files: files.iter().map(|(n, c)| (n.to_string(), c.to_string())).collect(),
      ..Self::default()
    }
  }

  pub fn requests(&self) -> Vec<BuildRequest> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl Builder for FakeBuilder {
  async fn build(&self, request: &BuildRequest) -> Result<(), BuildError> {
    self.requests.lock().unwrap().push(request.clone());
    if let Some(message) = &self.fail {
      return Err(BuildError::Other(message.clone()));
    }
    let dir = staging::template_config_dir(&request.template_path, &request.output_dir, &request.env)
      .map_err(|e| BuildError::Other(e.to_string()))?;
    std::fs::create_dir_all(&dir).map_err(|e| BuildError::Other(e.to_string()))?;
    for (name, contents) in &self.files {
      std::fs::write(dir.join(name), contents).map_err(|e| BuildError::Other(e.to_string()))?;
    }
    Ok(())
  }
}

/// A registry that is either up or never answers.
#[derive(Default)]
pub struct FakeWaiter {
  pub down: bool,
  calls: Mutex<Vec<(String, Duration)>>,
}

impl FakeWaiter {
  pub fn down() -> Self {
    Self {
      down: true,
      ..Self::default()
    }
  }

  pub fn calls(&self) -> Vec<(String, Duration)> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl RegistryWaiter for FakeWaiter {
  async fn wait(&self, address: &str, timeout: Duration) -> Result<(), WaitError> {
    self.calls.lock().unwrap().push((address.to_string(), timeout));
    if self.down {
      return Err(WaitError::NotResponding {
        url: format!("http://{}/v2/", address),
      });
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
  Status { project: String, mode: String },
  Run(ProvisionRequest),
}

/// Records provisioner calls; `run_provisioner` optionally fails.
#[derive(Default)]
pub struct FakeProvisioner {
  calls: Mutex<Vec<ProvisionCall>>,
  pub fail: Option<String>,
}

impl FakeProvisioner {
  pub fn failing(message: &str) -> Self {
    Self {
      fail: Some(message.to_string()),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> Vec<ProvisionCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn runs(&self) -> Vec<ProvisionRequest> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        ProvisionCall::Run(req) => Some(req),
        _ => None,
      })
      .collect()
  }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
  async fn run_provisioner(&self, request: &ProvisionRequest) -> Result<(), ProvisionError> {
    self.calls.lock().unwrap().push(ProvisionCall::Run(request.clone()));
    match &self.fail {
      Some(message) => Err(ProvisionError::Run(CommandError::Failed {
        command: "docker compose run --rm provisioner".into(),
        code: Some(1),
        output: message.clone(),
      })),
      None => Ok(()),
    }
  }

  async fn check_services_status(&self, project: &str, mode: &str) {
    self.calls.lock().unwrap().push(ProvisionCall::Status {
      project: project.to_string(),
      mode: mode.to_string(),
    });
  }
}
