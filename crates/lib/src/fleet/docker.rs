//! [`FleetClient`] implemented by shelling out to the `docker` CLI.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
  ContainerDetail, ContainerFilter, ContainerSummary, FleetClient, FleetError, MountKind, MountPoint, PruneKind,
  PruneReport,
};
use crate::exec::{CommandRunner, Invocation};

pub struct DockerCliFleet {
  runner: Arc<dyn CommandRunner>,
  program: String,
}

impl DockerCliFleet {
  pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
    Self {
      runner,
      program: program.into(),
    }
  }

  fn docker(&self) -> Invocation {
    Invocation::new(&self.program)
  }

  async fn inspect_many(&self, ids: &[String]) -> Result<Vec<InspectRecord>, FleetError> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let stdout = self
      .runner
      .run_output(&self.docker().arg("inspect").args(ids.iter().cloned()))
      .await?;
    Ok(serde_json::from_slice(&stdout)?)
  }
}

fn label_filters(labels: &[(String, String)]) -> Vec<String> {
  labels
    .iter()
    .flat_map(|(k, v)| ["--filter".to_string(), format!("label={}={}", k, v)])
    .collect()
}

/// Subset of `docker inspect` output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
  id: String,
  #[serde(default)]
  name: String,
  #[serde(default)]
  config: InspectConfig,
  #[serde(default)]
  state: InspectState,
  #[serde(default)]
  network_settings: InspectNetworkSettings,
  #[serde(default, deserialize_with = "null_as_default")]
  mounts: Vec<InspectMount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
  #[serde(default)]
  image: String,
  #[serde(default, deserialize_with = "null_as_default")]
  labels: BTreeMap<String, String>,
  #[serde(default, deserialize_with = "null_as_default")]
  env: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
  #[serde(default)]
  status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
  #[serde(default, deserialize_with = "null_as_default")]
  networks: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectMount {
  #[serde(default, rename = "Type")]
  kind: String,
  #[serde(default)]
  name: String,
  #[serde(default)]
  source: String,
  #[serde(default)]
  destination: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: serde::Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<InspectRecord> for ContainerSummary {
  fn from(record: InspectRecord) -> Self {
    let name = record.name.trim_start_matches('/').to_string();
    ContainerSummary {
      id: record.id,
      names: if name.is_empty() { Vec::new() } else { vec![name] },
      image: record.config.image,
      state: record.state.status,
      labels: record.config.labels,
      networks: record.network_settings.networks.into_keys().collect(),
      mounts: record
        .mounts
        .into_iter()
        .map(|m| MountPoint {
          kind: match m.kind.as_str() {
            "bind" => MountKind::Bind,
            "volume" => MountKind::Volume,
            _ => MountKind::Other,
          },
          name: m.name,
          source: m.source,
          destination: m.destination,
        })
        .collect(),
    }
  }
}

/// Extract the value of docker's `Total reclaimed space:` line.
fn parse_reclaimed(output: &str) -> Option<String> {
  output.lines().find_map(|line| {
    line
      .trim()
      .strip_prefix("Total reclaimed space:")
      .map(|rest| rest.trim().to_string())
  })
}

#[async_trait]
impl FleetClient for DockerCliFleet {
  async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>, FleetError> {
    let mut inv = self.docker().arg("ps");
    if filter.all {
      inv = inv.arg("-a");
    }
    inv = inv.args(["-q", "--no-trunc"]).args(label_filters(&filter.labels));

    let stdout = self.runner.run_output(&inv).await?;
    let ids: Vec<String> = String::from_utf8_lossy(&stdout)
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(str::to_string)
      .collect();
    debug!(count = ids.len(), "listed containers");

    Ok(self.inspect_many(&ids).await?.into_iter().map(Into::into).collect())
  }

  async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, FleetError> {
    let record = self
      .inspect_many(&[id.to_string()])
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| FleetError::NotFound(id.to_string()))?;
    Ok(ContainerDetail {
      id: record.id,
      env: record.config.env,
      networks: record.network_settings.networks.into_keys().collect(),
    })
  }

  async fn prune(&self, kind: PruneKind, labels: &[(String, String)]) -> Result<PruneReport, FleetError> {
    let mut inv = self.docker().args([kind.as_str(), "prune", "-f"]);
    if let PruneKind::Image { all: true } = kind {
      inv = inv.arg("-a");
    }
    inv = inv.args(label_filters(labels));
    let stdout = self.runner.run_output(&inv).await?;
    Ok(PruneReport {
      reclaimed: parse_reclaimed(&String::from_utf8_lossy(&stdout)),
    })
  }
}
