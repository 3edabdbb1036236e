//! Deploy orchestration.
//!
//! [`DeployWorkflow`] drives a deploy through its phases. Everything it talks to outside the
//! process sits behind a trait: [`Builder`] for generation, [`Provisioner`] for resource
//! creation, [`RegistryWaiter`] for readiness, plus the fleet and command seams from
//! [`crate::fleet`] and [`crate::exec`]. The remaining modules are the pieces of the
//! pipeline, usable on their own.

mod builder;
mod env;
mod error;
mod gateway;
mod manifest;
mod observation;
mod prewarm;
mod propagate;
mod provision;
pub mod staging;
mod summary;
mod types;
mod wait;
mod workflow;

pub use builder::{BuildError, Builder, GeneratorCommand};
pub use env::{CONFIG_DIR, ENV, EnvApplier, EnvApplyError, MODE, NETWORK_EXTERNAL, PROJECT_NAME, RuntimeEnv};
pub use error::DeployError;
pub(crate) use gateway::align_gateway;
pub use gateway::{GatewayRuntimeInfo, pick_gateway_network, resolve_gateway_runtime, services_missing_network};
pub use observation::{parse_image_tag, resolve_runtime_observation};
pub use prewarm::{ImageSyncCode, ImageSyncError, PrewarmMode, prewarm_images, resolve_push_ref};
pub use propagate::{
  Channel, PropagationError, RuntimeConfigTarget, SyncError, propagate_runtime_config, resolve_runtime_config_target,
  sync_runtime_config,
};
pub use provision::{
  ComposeProvisioner, ProjectComposeFiles, ProvisionError, ProvisionRequest, Provisioner, agent_service,
  default_compose_files, resolve_project_compose_files,
};
pub use types::{BuildRequest, DeployContext, DeployRequest};
pub use wait::{HttpRegistryWaiter, RegistryWaiter, WaitError, is_local_host, probe_urls};
pub use workflow::DeployWorkflow;
