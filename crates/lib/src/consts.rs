//! Shared constants for edgebox.

/// Application name, used for platform directories and default project keys.
pub const APP_NAME: &str = "edgebox";

/// Prefix applied to every environment variable edgebox reads.
pub const ENV_PREFIX: &str = "EDGEBOX";

/// Directory (relative to the template) that holds generated output and staging.
pub const OUTPUT_DIR: &str = ".edgebox";

/// Label the compose supervisor stamps with the project name.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Label the compose supervisor stamps with the service name.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// Label listing the compose files a project was started from (comma separated).
pub const COMPOSE_CONFIG_FILES_LABEL: &str = "com.docker.compose.project.config_files";

/// Label holding the directory a compose project was started from.
pub const COMPOSE_WORKING_DIR_LABEL: &str = "com.docker.compose.project.working_dir";

/// Mount point of the runtime configuration inside fleet containers.
pub const RUNTIME_CONFIG_MOUNT_PATH: &str = "/app/runtime-config";

/// Runtime configuration files propagated into the fleet.
pub const RUNTIME_CONFIG_FILES: [&str; 3] = ["functions.yml", "routing.yml", "resources.yml"];

/// Image import manifest written by generation next to the runtime config.
pub const IMAGE_IMPORT_FILE: &str = "image-import.json";

/// File name of the artifact manifest written after generation.
pub const ARTIFACT_MANIFEST_FILE: &str = "artifact.yml";

/// Well-known compose service names.
pub mod services {
  pub const GATEWAY: &str = "gateway";
  pub const AGENT: &str = "agent";
  pub const RUNTIME_NODE: &str = "runtime-node";
  pub const PROVISIONER: &str = "provisioner";
  pub const DATABASE: &str = "database";
  pub const S3_STORAGE: &str = "s3-storage";
  pub const VICTORIALOGS: &str = "victorialogs";
}

/// Default registry port when no address override is configured.
pub const DEFAULT_REGISTRY_PORT: &str = "5010";
