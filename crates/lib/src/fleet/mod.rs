//! Fleet inspection.
//!
//! A narrow view of the container runtime: list containers by label, inspect one container's
//! environment and networks, and prune label-scoped resources. [`DockerCliFleet`] implements
//! it on top of the `docker` CLI.

mod docker;
mod prune;
mod types;

pub use docker::DockerCliFleet;
pub use prune::{PruneOptions, PruneOutcome, prune_project};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::exec::CommandError;

#[derive(Debug, Error)]
pub enum FleetError {
  #[error(transparent)]
  Command(#[from] CommandError),

  #[error("failed to parse docker inspect output: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("container not found: {0}")]
  NotFound(String),

  #[error("compose project is required")]
  ProjectRequired,
}

#[async_trait]
pub trait FleetClient: Send + Sync {
  async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>, FleetError>;

  async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, FleetError>;

  async fn prune(&self, kind: PruneKind, labels: &[(String, String)]) -> Result<PruneReport, FleetError>;
}
