//! What the live fleet actually runs, for artifact runtime-stack checks.

use std::collections::BTreeMap;

use crate::artifact::RuntimeObservation;
use crate::consts::{COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL, services};
use crate::fleet::{ContainerFilter, FleetClient};

const PREFERRED_SERVICES: [&str; 4] = [services::GATEWAY, services::RUNTIME_NODE, services::AGENT, services::PROVISIONER];

/// Tag of an image reference, ignoring any digest. Empty when untagged.
pub fn parse_image_tag(image: &str) -> &str {
  let image = image.trim();
  let image = image.split('@').next().unwrap_or(image);
  let last = image.rsplit('/').next().unwrap_or(image);
  last.rsplit_once(':').map(|(_, tag)| tag).unwrap_or_default()
}

/// The image that best describes the stack, with its service.
fn preferred_service_image(images: &BTreeMap<String, String>) -> Option<(&str, &str)> {
  PREFERRED_SERVICES
    .iter()
    .find_map(|service| images.get_key_value(*service))
    .or_else(|| images.iter().next())
    .map(|(service, image)| (service.as_str(), image.as_str()))
}

fn infer_mode(images: &BTreeMap<String, String>) -> Option<&'static str> {
  if images.contains_key(services::RUNTIME_NODE) || images.values().any(|i| i.contains("containerd")) {
    return Some("containerd");
  }
  if images.contains_key(services::AGENT) {
    return Some("docker");
  }
  None
}

/// Observe the runtime of `project`, starting from what the request claims.
///
/// Returns the observation and any warnings collected while inspecting the fleet.
pub async fn resolve_runtime_observation(
  fleet: Option<&dyn FleetClient>,
  project: &str,
  mode: &str,
  tag: &str,
) -> (RuntimeObservation, Vec<String>) {
  let mut observation = RuntimeObservation {
    mode: mode.trim().to_string(),
    version: tag.trim().to_string(),
    source: "deploy request".to_string(),
  };
  let mut warnings = Vec::new();

  let project = project.trim();
  let Some(fleet) = fleet.filter(|_| !project.is_empty()) else {
    return (observation, warnings);
  };

  let filter = ContainerFilter::default().label(COMPOSE_PROJECT_LABEL, project);
  let containers = match fleet.list_containers(&filter).await {
    Ok(containers) => containers,
    Err(e) => {
      warnings.push(format!("resolve runtime observation container list: {}", e));
      return (observation, warnings);
    }
  };

  let images: BTreeMap<String, String> = containers
    .iter()
    .filter(|c| c.is_running())
    .filter_map(|c| {
      let service = c.label(COMPOSE_SERVICE_LABEL)?.trim();
      let image = c.image.trim();
      (!service.is_empty() && !image.is_empty()).then(|| (service.to_string(), image.to_string()))
    })
    .collect();

  let Some((service, image)) = preferred_service_image(&images) else {
    warnings.push(format!("runtime observation found no compose services for project {:?}", project));
    return (observation, warnings);
  };
  if let Some(mode) = infer_mode(&images) {
    observation.mode = mode.to_string();
  }
  let tag = parse_image_tag(image);
  if !tag.is_empty() {
    observation.version = tag.to_string();
  }
  observation.source = format!("docker compose project={} service={}", project, service);
  (observation, warnings)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeFleet, container};

  #[test]
  fn tag_parsing() {
    assert_eq!(parse_image_tag("edgebox/gateway:1.4.0"), "1.4.0");
    assert_eq!(parse_image_tag("registry:5010/edgebox/gateway"), "");
    assert_eq!(parse_image_tag("registry:5010/gw:2.0@sha256:abc"), "2.0");
    assert_eq!(parse_image_tag(""), "");
  }

  #[tokio::test]
  async fn request_values_without_fleet() {
    let (obs, warnings) = resolve_runtime_observation(None, "edge", "docker", "v1").await;
    assert_eq!(obs.mode, "docker");
    assert_eq!(obs.version, "v1");
    assert_eq!(obs.source, "deploy request");
    assert!(warnings.is_empty());
  }

  #[tokio::test]
  async fn gateway_image_decides_version_and_runtime_node_the_mode() {
    let mut gw = container("g", "edge", services::GATEWAY, true);
    gw.image = "edgebox/gateway:2.1.0".into();
    let mut node = container("n", "edge", services::RUNTIME_NODE, true);
    node.image = "edgebox/runtime-node:2.1.0".into();
    let mut stale = container("old", "edge", services::AGENT, false);
    stale.image = "edgebox/agent:1.0.0".into();
    let fleet = FakeFleet::with(vec![gw, node, stale]);

    let (obs, warnings) = resolve_runtime_observation(Some(&fleet), "edge", "docker", "latest").await;

    assert!(warnings.is_empty());
    assert_eq!(obs.mode, "containerd");
    assert_eq!(obs.version, "2.1.0");
    assert_eq!(obs.source, "docker compose project=edge service=gateway");
  }

  #[tokio::test]
  async fn problems_become_warnings() {
    let fleet = FakeFleet::with(Vec::new());
    let (obs, warnings) = resolve_runtime_observation(Some(&fleet), "edge", "docker", "v1").await;
    assert_eq!(obs.source, "deploy request");
    assert_eq!(warnings, vec![r#"runtime observation found no compose services for project "edge""#]);

    let fleet = FakeFleet::unreachable();
    let (_, warnings) = resolve_runtime_observation(Some(&fleet), "edge", "docker", "v1").await;
    assert!(warnings[0].starts_with("resolve runtime observation container list:"));
  }
}
