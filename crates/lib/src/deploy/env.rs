//! Runtime environment handed to generation and provisioning.
//!
//! The resolved identity of a deploy (project name override, external network, staging config
//! dir, env, mode) is carried as an explicit [`RuntimeEnv`] value instead of being written into
//! the process environment. Callers that still need process-level variables can plug in an
//! [`EnvApplier`].

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use super::{DeployContext, GatewayRuntimeInfo};
use crate::settings::DeploySettings;

pub const PROJECT_NAME: &str = "PROJECT_NAME";
pub const NETWORK_EXTERNAL: &str = "NETWORK_EXTERNAL";
pub const CONFIG_DIR: &str = "CONFIG_DIR";
pub const ENV: &str = "ENV";
pub const MODE: &str = "MODE";

/// Ordered set of environment variables for external commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
  vars: BTreeMap<String, String>,
}

impl RuntimeEnv {
  /// Build the env for a deploy.
  ///
  /// Gateway-derived values win over settings overrides. Empty values are omitted. With an
  /// env prefix configured, every key is also emitted as `<PREFIX>_<KEY>`.
  pub fn resolve(
    context: &DeployContext,
    gateway: &GatewayRuntimeInfo,
    settings: &DeploySettings,
    config_dir: &Path,
  ) -> Self {
    let pick = |primary: &str, fallback: Option<&String>| -> String {
      let primary = primary.trim();
      if !primary.is_empty() {
        return primary.to_string();
      }
      fallback.map(|s| s.trim().to_string()).unwrap_or_default()
    };

    let base = [
      (
        PROJECT_NAME,
        pick(
          &gateway.project_name,
          settings.project_name_override.as_ref().or(Some(&context.compose_project)),
        ),
      ),
      (NETWORK_EXTERNAL, pick(&gateway.network, settings.network_override.as_ref())),
      (CONFIG_DIR, config_dir.to_string_lossy().into_owned()),
      (ENV, context.env.trim().to_string()),
      (MODE, context.mode.trim().to_ascii_lowercase()),
    ];

    let prefix = settings
      .env_prefix
      .as_deref()
      .map(|p| p.trim().trim_end_matches('_').to_ascii_uppercase())
      .filter(|p| !p.is_empty());

    let mut env = Self::default();
    for (key, value) in base {
      if value.is_empty() {
        continue;
      }
      if let Some(prefix) = &prefix {
        env.set(format!("{}_{}", prefix, key), value.clone());
      }
      env.set(key, value);
    }
    env
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.vars.insert(key.into(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

#[derive(Debug, Error)]
#[error("apply runtime env: {message}")]
pub struct EnvApplyError {
  pub message: String,
}

/// Optional hook that makes a [`RuntimeEnv`] visible outside the pipeline.
pub trait EnvApplier: Send + Sync {
  fn apply(&self, env: &RuntimeEnv) -> Result<(), EnvApplyError>;
}
