//! Environment-derived settings.
//!
//! Everything edgebox reads from the process environment is resolved once, at startup, into a
//! [`DeploySettings`] value that is then passed explicitly to the deploy workflow.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `EDGEBOX_REGISTRY_ADDR` | host-side registry address (scheme optional) |
//! | `EDGEBOX_REGISTRY_PORT` | registry port on 127.0.0.1 when no address is set (default 5010) |
//! | `EDGEBOX_REGISTRY_TIMEOUT` | readiness timeout, humantime syntax (default `60s`) |
//! | `EDGEBOX_SKIP_GATEWAY_ALIGN` | `1`/`true`/`yes` skips gateway alignment |
//! | `EDGEBOX_NETWORK_EXTERNAL` | external network used when no gateway is detected |
//! | `EDGEBOX_PROJECT_NAME` | project-name override used when no gateway is detected |
//! | `EDGEBOX_ENV_PREFIX` | prefix for host-visible runtime env variables |
//! | `EDGEBOX_STAGING_DIR` | staging root override |
//! | `EDGEBOX_DOCKER` | docker program (default `docker`) |
//! | `EDGEBOX_GENERATOR` | generator program used for the build phase |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::consts::{DEFAULT_REGISTRY_PORT, ENV_PREFIX};

/// Default readiness timeout for the registry waiter.
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("invalid {key} value {value:?}: {source}")]
  InvalidDuration {
    key: String,
    value: String,
    #[source]
    source: humantime::DurationError,
  },
}

/// Settings resolved from `EDGEBOX_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
  pub registry_addr: Option<String>,
  pub registry_port: Option<String>,
  pub registry_timeout: Duration,
  pub skip_gateway_align: bool,
  pub network_override: Option<String>,
  pub project_name_override: Option<String>,
  pub env_prefix: Option<String>,
  pub staging_dir: Option<PathBuf>,
  pub docker: String,
  pub generator: Option<String>,
}

impl Default for DeploySettings {
  fn default() -> Self {
    Self {
      registry_addr: None,
      registry_port: None,
      registry_timeout: DEFAULT_REGISTRY_TIMEOUT,
      skip_gateway_align: false,
      network_override: None,
      project_name_override: None,
      env_prefix: None,
      staging_dir: None,
      docker: "docker".to_string(),
      generator: None,
    }
  }
}

/// Full variable name for an `EDGEBOX_` suffix.
pub fn env_key(suffix: &str) -> String {
  format!("{}_{}", ENV_PREFIX, suffix)
}

fn truthy(value: &str) -> bool {
  matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

impl DeploySettings {
  /// Read settings from the process environment.
  pub fn from_env() -> Result<Self, SettingsError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Read settings through an arbitrary lookup. Blank values count as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
    let get = |suffix: &str| {
      lookup(&env_key(suffix))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    };

    let mut settings = Self {
      registry_addr: get("REGISTRY_ADDR"),
      registry_port: get("REGISTRY_PORT"),
      skip_gateway_align: get("SKIP_GATEWAY_ALIGN").map(|v| truthy(&v)).unwrap_or(false),
      network_override: get("NETWORK_EXTERNAL"),
      project_name_override: get("PROJECT_NAME"),
      env_prefix: get("ENV_PREFIX"),
      staging_dir: get("STAGING_DIR").map(PathBuf::from),
      generator: get("GENERATOR"),
      ..Self::default()
    };

    if let Some(docker) = get("DOCKER") {
      settings.docker = docker;
    }
    if let Some(raw) = get("REGISTRY_TIMEOUT") {
      settings.registry_timeout = humantime::parse_duration(&raw).map_err(|source| SettingsError::InvalidDuration {
        key: env_key("REGISTRY_TIMEOUT"),
        value: raw.clone(),
        source,
      })?;
    }

    Ok(settings)
  }

  /// Host-side registry address probed before deploying.
  ///
  /// An explicit address has its scheme and trailing slash stripped; otherwise the
  /// registry is assumed on `127.0.0.1` at the configured port.
  pub fn registry_address(&self) -> String {
    if let Some(addr) = &self.registry_addr {
      let trimmed = addr.trim();
      let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
      return without_scheme.trim_end_matches('/').to_string();
    }
    let port = self.registry_port.as_deref().unwrap_or(DEFAULT_REGISTRY_PORT);
    format!("127.0.0.1:{}", port)
  }
}
