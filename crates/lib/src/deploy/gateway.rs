//! Gateway runtime resolution.
//!
//! The live fleet is the source of truth for project identity: when a gateway container is
//! already running, its compose project, declared `PROJECT_NAME` and network take precedence
//! over whatever the caller assumed.

use std::collections::BTreeSet;

use tracing::debug;

use super::DeployContext;
use crate::consts::{COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL, services};
use crate::fleet::{ContainerFilter, FleetClient, FleetError};
use crate::ui::UserInterface;

/// Identity of the live gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayRuntimeInfo {
  pub compose_project: String,
  /// `PROJECT_NAME` declared in the gateway's environment.
  pub project_name: String,
  /// Network the gateway serves functions on.
  pub network: String,
}

const INFRA_SERVICES: [&str; 3] = [services::DATABASE, services::S3_STORAGE, services::VICTORIALOGS];

/// Inspect the gateway of `project` (or of any project when empty).
///
/// Running gateways are preferred; ties break on container name. `Ok(None)` means no gateway
/// container exists.
pub async fn resolve_gateway_runtime(
  fleet: &dyn FleetClient,
  project: &str,
) -> Result<Option<GatewayRuntimeInfo>, FleetError> {
  let mut filter = ContainerFilter::default()
    .label(COMPOSE_SERVICE_LABEL, services::GATEWAY)
    .all();
  if !project.trim().is_empty() {
    filter = filter.label(COMPOSE_PROJECT_LABEL, project.trim());
  }

  let mut containers = fleet.list_containers(&filter).await?;
  if containers.is_empty() {
    return Ok(None);
  }
  containers.sort_by(|a, b| {
    b.is_running()
      .cmp(&a.is_running())
      .then_with(|| a.primary_name().cmp(b.primary_name()))
  });
  let selected = &containers[0];
  debug!(container = %selected.primary_name(), "selected gateway container");

  let detail = fleet.inspect_container(&selected.id).await?;
  let mut network = detail.env_value("CONTAINERS_NETWORK").unwrap_or_default().trim().to_string();
  if network.is_empty() {
    network = pick_gateway_network(&detail.networks);
  }

  Ok(Some(GatewayRuntimeInfo {
    compose_project: selected.label(COMPOSE_PROJECT_LABEL).unwrap_or_default().trim().to_string(),
    project_name: detail.env_value("PROJECT_NAME").unwrap_or_default().trim().to_string(),
    network,
  }))
}

/// First network (sorted) whose name contains `external`, else the first one.
pub fn pick_gateway_network(networks: &[String]) -> String {
  let mut names: Vec<&String> = networks.iter().collect();
  names.sort();
  names
    .iter()
    .find(|n| n.contains("external"))
    .or_else(|| names.first())
    .map(|n| n.to_string())
    .unwrap_or_default()
}

/// Running infrastructure services of `project` not attached to `network`, sorted.
///
/// Listing failures yield an empty list.
pub async fn services_missing_network(fleet: &dyn FleetClient, project: &str, network: &str) -> Vec<String> {
  let mut filter = ContainerFilter::default();
  if !project.trim().is_empty() {
    filter = filter.label(COMPOSE_PROJECT_LABEL, project.trim());
  }
  let containers = match fleet.list_containers(&filter).await {
    Ok(containers) => containers,
    Err(e) => {
      debug!(error = %e, "skipping network mismatch check");
      return Vec::new();
    }
  };

  let missing: BTreeSet<String> = containers
    .iter()
    .filter_map(|c| {
      let service = c.label(COMPOSE_SERVICE_LABEL)?.trim();
      (INFRA_SERVICES.contains(&service) && !c.networks.iter().any(|n| n == network)).then(|| service.to_string())
    })
    .collect();
  missing.into_iter().collect()
}

/// Align `context` with the live gateway and report what changed.
///
/// Never fails: resolution problems are reported as warnings and yield default info.
pub(crate) async fn align_gateway(
  fleet: &dyn FleetClient,
  context: &mut DeployContext,
  ui: &dyn UserInterface,
) -> GatewayRuntimeInfo {
  let info = match resolve_gateway_runtime(fleet, &context.compose_project).await {
    Ok(Some(info)) => info,
    Ok(None) => return GatewayRuntimeInfo::default(),
    Err(e) => {
      ui.warn(&format!("failed to resolve gateway runtime: {}", e));
      return GatewayRuntimeInfo::default();
    }
  };

  if !info.compose_project.is_empty() && info.compose_project != context.compose_project {
    ui.warn(&format!(
      "using running gateway project {:?} (was {:?})",
      info.compose_project, context.compose_project
    ));
    context.compose_project = info.compose_project.clone();
  }

  if !info.network.is_empty() {
    let missing = services_missing_network(fleet, &context.compose_project, &info.network).await;
    if !missing.is_empty() {
      ui.warn(&format!(
        "gateway network {:?} is missing services: {}. Recreate the stack or attach the services to that network.",
        info.network,
        missing.join(", ")
      ));
    }
  }
  info
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeFleet, RecordingUi, container};

  fn gateway(id: &str, project: &str, name: &str, running: bool) -> crate::fleet::ContainerSummary {
    let mut c = container(id, project, services::GATEWAY, running);
    c.names = vec![name.to_string()];
    c
  }

  #[tokio::test]
  async fn prefers_running_then_name() {
    let fleet = FakeFleet::with(vec![
      gateway("c1", "edge-a", "zeta", false),
      gateway("c2", "edge-b", "beta", true),
      gateway("c3", "edge-c", "alpha", true),
    ])
    .detail("c3", &["PROJECT_NAME=edge-c-live"], &["edge-c_default"]);

    let info = resolve_gateway_runtime(&fleet, "").await.unwrap().unwrap();
    assert_eq!(info.compose_project, "edge-c");
    assert_eq!(info.project_name, "edge-c-live");
    assert_eq!(info.network, "edge-c_default");

    let filters = fleet.list_filters();
    assert!(filters[0].all);
    assert_eq!(filters[0].labels.len(), 1);
  }

  #[tokio::test]
  async fn containers_network_env_wins() {
    let fleet = FakeFleet::with(vec![gateway("g", "edge", "edge-gateway-1", true)]).detail(
      "g",
      &["CONTAINERS_NETWORK=edge-fn"],
      &["edge-external"],
    );
    let info = resolve_gateway_runtime(&fleet, "edge").await.unwrap().unwrap();
    assert_eq!(info.network, "edge-fn");
  }

  #[tokio::test]
  async fn no_gateway_is_none() {
    let fleet = FakeFleet::with(vec![container("db", "edge", services::DATABASE, true)]);
    assert!(resolve_gateway_runtime(&fleet, "edge").await.unwrap().is_none());
  }

  #[test]
  fn network_pick_prefers_external() {
    let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert_eq!(pick_gateway_network(&names(&["b_default", "z-external", "a-external"])), "a-external");
    assert_eq!(pick_gateway_network(&names(&["b_default", "a_default"])), "a_default");
    assert_eq!(pick_gateway_network(&[]), "");
  }

  #[tokio::test]
  async fn align_rewrites_project_and_warns_about_detached_services() {
    let mut db = container("db", "edge-live", services::DATABASE, true);
    db.networks = vec!["edge-live_default".into()];
    let mut logs = container("logs", "edge-live", services::VICTORIALOGS, true);
    logs.networks = vec!["edge-live-external".into()];
    let mut s3 = container("s3", "edge-live", services::S3_STORAGE, true);
    s3.networks = vec![];

    let fleet = FakeFleet::with(vec![gateway("gw", "edge-live", "edge-live-gateway-1", true), db, logs, s3]).detail(
      "gw",
      &[],
      &["edge-live-external", "edge-live_default"],
    );
    let ui = RecordingUi::default();
    let mut context = DeployContext::default();

    let info = align_gateway(&fleet, &mut context, &ui).await;

    assert_eq!(context.compose_project, "edge-live");
    assert_eq!(info.network, "edge-live-external");
    assert_eq!(
      ui.warnings(),
      vec![
        r#"using running gateway project "edge-live" (was "")"#.to_string(),
        r#"gateway network "edge-live-external" is missing services: database, s3-storage. Recreate the stack or attach the services to that network."#.to_string(),
      ]
    );
  }

  #[tokio::test]
  async fn align_degrades_to_warning_on_fleet_error() {
    let fleet = FakeFleet::unreachable();
    let ui = RecordingUi::default();
    let mut context = DeployContext {
      compose_project: "edge".into(),
      ..Default::default()
    };

    let info = align_gateway(&fleet, &mut context, &ui).await;

    assert_eq!(info, GatewayRuntimeInfo::default());
    assert_eq!(context.compose_project, "edge");
    assert_eq!(ui.warnings().len(), 1);
    assert!(ui.warnings()[0].starts_with("failed to resolve gateway runtime:"));
  }
}
