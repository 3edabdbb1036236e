//! Label-scoped cleanup of a compose project's stopped resources.

use serde::Serialize;
use tracing::info;

use super::{FleetClient, FleetError, PruneKind};
use crate::consts::COMPOSE_PROJECT_LABEL;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOptions {
  pub volumes: bool,
  /// Remove every unused image of the project, not only dangling ones.
  pub all_images: bool,
}

/// What was pruned for one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneOutcome {
  pub kind: &'static str,
  pub reclaimed: Option<String>,
}

/// Prune stopped containers, unused networks, optionally volumes, and images of `project`.
///
/// Running containers are never touched; docker's prune only considers unused resources.
pub async fn prune_project(
  fleet: &dyn FleetClient,
  project: &str,
  options: PruneOptions,
) -> Result<Vec<PruneOutcome>, FleetError> {
  let project = project.trim();
  if project.is_empty() {
    return Err(FleetError::ProjectRequired);
  }
  let labels = vec![(COMPOSE_PROJECT_LABEL.to_string(), project.to_string())];

  let mut kinds = vec![PruneKind::Container, PruneKind::Network];
  if options.volumes {
    kinds.push(PruneKind::Volume);
  }
  kinds.push(PruneKind::Image {
    all: options.all_images,
  });

  let mut outcomes = Vec::with_capacity(kinds.len());
  for kind in kinds {
    let report = fleet.prune(kind, &labels).await?;
    info!(project = %project, kind = %kind, reclaimed = ?report.reclaimed, "pruned");
    outcomes.push(PruneOutcome {
      kind: kind.as_str(),
      reclaimed: report.reclaimed,
    });
  }
  Ok(outcomes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::FakeFleet;

  #[tokio::test]
  async fn prunes_in_order_with_project_label() {
    let fleet = FakeFleet::default();
    let outcomes = prune_project(
      &fleet,
      " edge ",
      PruneOptions {
        volumes: true,
        all_images: false,
      },
    )
    .await
    .unwrap();

    let kinds: Vec<_> = outcomes.iter().map(|o| o.kind).collect();
    assert_eq!(kinds, vec!["container", "network", "volume", "image"]);

    let calls = fleet.prune_calls();
    assert_eq!(calls[3].0, PruneKind::Image { all: false });
    for (_, labels) in calls {
      assert_eq!(labels, vec![(COMPOSE_PROJECT_LABEL.to_string(), "edge".to_string())]);
    }
  }

  #[tokio::test]
  async fn volumes_skipped_by_default() {
    let fleet = FakeFleet::default();
    let outcomes = prune_project(&fleet, "edge", PruneOptions::default()).await.unwrap();
    assert!(outcomes.iter().all(|o| o.kind != "volume"));
  }

  #[tokio::test]
  async fn empty_project_is_rejected() {
    let fleet = FakeFleet::default();
    let err = prune_project(&fleet, "  ", PruneOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "compose project is required");
    assert!(fleet.prune_calls().is_empty());
  }
}
