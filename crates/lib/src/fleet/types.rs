use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Label selector for [`FleetClient::list_containers`](super::FleetClient::list_containers).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
  /// `key=value` pairs, all of which must match.
  pub labels: Vec<(String, String)>,
  /// Include stopped containers.
  pub all: bool,
}

impl ContainerFilter {
  pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.labels.push((key.into(), value.into()));
    self
  }

  pub fn all(mut self) -> Self {
    self.all = true;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
  Bind,
  Volume,
  Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
  pub kind: MountKind,
  /// Volume name; empty for bind mounts.
  pub name: String,
  pub source: String,
  pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
  pub id: String,
  /// Container names without the leading `/`.
  pub names: Vec<String>,
  pub image: String,
  /// Runtime state as reported by docker, e.g. `running`, `exited`.
  pub state: String,
  pub labels: BTreeMap<String, String>,
  pub networks: Vec<String>,
  pub mounts: Vec<MountPoint>,
}

impl ContainerSummary {
  pub fn is_running(&self) -> bool {
    self.state.eq_ignore_ascii_case("running")
  }

  /// First name, or the id when the container is unnamed.
  pub fn primary_name(&self) -> &str {
    self.names.first().map(String::as_str).unwrap_or(&self.id)
  }

  pub fn label(&self, key: &str) -> Option<&str> {
    self.labels.get(key).map(String::as_str)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetail {
  pub id: String,
  /// Declared environment as `KEY=VALUE` strings.
  pub env: Vec<String>,
  pub networks: Vec<String>,
}

impl ContainerDetail {
  /// Value of a declared environment variable.
  pub fn env_value(&self, key: &str) -> Option<&str> {
    self.env.iter().find_map(|entry| {
      let (k, v) = entry.split_once('=')?;
      (k == key).then_some(v)
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneKind {
  Container,
  Network,
  Volume,
  /// Dangling images only, or every unused image when `all` is set.
  Image { all: bool },
}

impl PruneKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      PruneKind::Container => "container",
      PruneKind::Network => "network",
      PruneKind::Volume => "volume",
      PruneKind::Image { .. } => "image",
    }
  }
}

impl fmt::Display for PruneKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
  /// Reclaimed space as printed by docker, e.g. `12.5MB`.
  pub reclaimed: Option<String>,
}
