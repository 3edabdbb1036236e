//! Image prewarm.
//!
//! Image-backed functions reference images that live in external registries. Before the
//! runtime needs them they are pulled, retagged for the local registry and pushed, so that
//! missing or unauthorized images fail the deploy instead of the first invocation.

use std::fmt;

use thiserror::Error;
use tracing::info;

use super::DeployError;
use crate::config::ImageImportManifest;
use crate::exec::{CommandError, CommandRunner, Invocation};
use crate::ui::UserInterface;

/// Whether image-backed functions get their images mirrored before deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrewarmMode {
  Off,
  #[default]
  All,
}

impl PrewarmMode {
  /// Parse a `--image-prewarm` value. Case and surrounding whitespace are ignored; empty
  /// means `all`.
  pub fn parse(value: &str) -> Result<Self, DeployError> {
    match value.trim().to_ascii_lowercase().as_str() {
      "" | "all" => Ok(PrewarmMode::All),
      "off" => Ok(PrewarmMode::Off),
      _ => Err(DeployError::InvalidPrewarmMode(value.to_string())),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      PrewarmMode::Off => "off",
      PrewarmMode::All => "all",
    }
  }
}

/// Failure class of an image sync step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSyncCode {
  PullFailed,
  AuthFailed,
  PushFailed,
  DigestMismatch,
}

impl ImageSyncCode {
  pub fn as_str(&self) -> &'static str {
    match self {
      ImageSyncCode::PullFailed => "IMAGE_PULL_FAILED",
      ImageSyncCode::AuthFailed => "IMAGE_AUTH_FAILED",
      ImageSyncCode::PushFailed => "IMAGE_PUSH_FAILED",
      ImageSyncCode::DigestMismatch => "IMAGE_DIGEST_MISMATCH",
    }
  }
}

impl fmt::Display for ImageSyncCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
#[error("{code}: image={image}: {cause}")]
pub struct ImageSyncError {
  pub code: ImageSyncCode,
  pub image: String,
  pub cause: CommandError,
}

const AUTH_MARKERS: [&str; 3] = ["unauthorized", "authentication required", "denied"];

fn classify(code: ImageSyncCode, image: &str, cause: CommandError) -> ImageSyncError {
  let output = cause.output().to_ascii_lowercase();
  let code = if AUTH_MARKERS.iter().any(|m| output.contains(m)) {
    ImageSyncCode::AuthFailed
  } else {
    code
  };
  ImageSyncError {
    code,
    image: image.to_string(),
    cause,
  }
}

/// Rewrite the registry part of `image_ref` to `push_target`.
///
/// The push target may carry a scheme and trailing slash. Refs without a registry part are
/// returned unchanged.
pub fn resolve_push_ref(image_ref: &str, push_target: &str) -> String {
  let image_ref = image_ref.trim();
  let host = push_target.trim();
  if image_ref.is_empty() || host.is_empty() {
    return image_ref.to_string();
  }
  let host = host
    .strip_prefix("http://")
    .or_else(|| host.strip_prefix("https://"))
    .unwrap_or(host)
    .trim_end_matches('/');
  match image_ref.find('/') {
    Some(slash) if slash > 0 => format!("{}{}", host, &image_ref[slash..]),
    _ => image_ref.to_string(),
  }
}

/// Pull, retag and push every image of `manifest`, stopping at the first failure.
pub async fn prewarm_images(
  runner: &dyn CommandRunner,
  docker: &str,
  manifest: &ImageImportManifest,
  ui: &dyn UserInterface,
  verbose: bool,
) -> Result<(), ImageSyncError> {
  if manifest.is_empty() {
    return Ok(());
  }
  ui.info(&format!("Image prewarm: {} image(s)", manifest.images.len()));

  for entry in &manifest.images {
    let source = entry.image_source.trim();
    let image_ref = entry.image_ref.trim();
    if source.is_empty() || image_ref.is_empty() {
      continue;
    }
    let target = resolve_push_ref(image_ref, &manifest.push_target);
    if verbose {
      ui.info(&format!("Prewarm image: {} -> {}", source, target));
    }

    runner
      .run_output(&Invocation::new(docker).args(["pull", source]))
      .await
      .map_err(|e| classify(ImageSyncCode::PullFailed, source, e))?;
    runner
      .run_output(&Invocation::new(docker).args(["tag", source, target.as_str()]))
      .await
      .map_err(|e| classify(ImageSyncCode::DigestMismatch, &target, e))?;
    runner
      .run_output(&Invocation::new(docker).args(["push", target.as_str()]))
      .await
      .map_err(|e| classify(ImageSyncCode::PushFailed, &target, e))?;
    info!(function = %entry.function_name, image = %target, "image prewarmed");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ImageImportEntry;
  use crate::util::testutil::{FakeRunner, RecordingUi, RunKind};

  fn manifest(push_target: &str, images: &[(&str, &str, &str)]) -> ImageImportManifest {
    ImageImportManifest {
      version: "1".into(),
      push_target: push_target.into(),
      images: images
        .iter()
        .map(|(f, s, r)| ImageImportEntry {
          function_name: f.to_string(),
          image_source: s.to_string(),
          image_ref: r.to_string(),
        })
        .collect(),
    }
  }

  #[test]
  fn prewarm_mode_parsing() {
    assert_eq!(PrewarmMode::parse("").unwrap(), PrewarmMode::All);
    assert_eq!(PrewarmMode::parse(" OFF ").unwrap(), PrewarmMode::Off);
    assert_eq!(PrewarmMode::parse("all").unwrap(), PrewarmMode::All);
    let err = PrewarmMode::parse("sometimes").unwrap_err();
    assert_eq!(err.to_string(), r#"invalid --image-prewarm value "sometimes" (use off|all)"#);
  }

  #[test]
  fn push_ref_replaces_registry_host() {
    assert_eq!(
      resolve_push_ref("registry:5010/fn/hello:latest", "http://127.0.0.1:5010/"),
      "127.0.0.1:5010/fn/hello:latest"
    );
    assert_eq!(resolve_push_ref("registry:5010/fn/hello:latest", ""), "registry:5010/fn/hello:latest");
    assert_eq!(resolve_push_ref("hello:latest", "127.0.0.1:5010"), "hello:latest");
    assert_eq!(resolve_push_ref("/odd:latest", "127.0.0.1:5010"), "/odd:latest");
  }

  #[tokio::test]
  async fn pulls_tags_and_pushes_in_order() {
    let runner = FakeRunner::new();
    let ui = RecordingUi::default();
    let m = manifest(
      "127.0.0.1:5010",
      &[
        ("hello", "public.ecr.aws/lambda/python:3.12", "registry:5010/fn/hello:latest"),
        ("skip", "", "registry:5010/fn/skip:latest"),
      ],
    );

    prewarm_images(&runner, "docker", &m, &ui, true).await.unwrap();

    assert_eq!(
      runner.commands(),
      vec![
        "docker pull public.ecr.aws/lambda/python:3.12",
        "docker tag public.ecr.aws/lambda/python:3.12 127.0.0.1:5010/fn/hello:latest",
        "docker push 127.0.0.1:5010/fn/hello:latest",
      ]
    );
    assert!(runner.calls().iter().all(|(kind, _)| *kind == RunKind::Output));
    assert_eq!(
      ui.infos(),
      vec![
        "Image prewarm: 2 image(s)",
        "Prewarm image: public.ecr.aws/lambda/python:3.12 -> 127.0.0.1:5010/fn/hello:latest",
      ]
    );
  }

  #[tokio::test]
  async fn auth_failures_are_reclassified() {
    let runner = FakeRunner::new();
    runner.fail("docker pull", "Error response from daemon: pull access denied for private/img");
    let m = manifest("", &[("hello", "private/img:1", "registry:5010/fn/hello:1")]);

    let err = prewarm_images(&runner, "docker", &m, &RecordingUi::default(), false)
      .await
      .unwrap_err();

    assert_eq!(err.code, ImageSyncCode::AuthFailed);
    assert_eq!(err.image, "private/img:1");
    assert!(err.to_string().starts_with("IMAGE_AUTH_FAILED: image=private/img:1: docker pull"));
    assert_eq!(runner.commands().len(), 1);
  }

  #[tokio::test]
  async fn push_failure_keeps_its_code() {
    let runner = FakeRunner::new();
    runner.fail("docker push", "connection refused");
    let m = manifest("", &[("hello", "img:1", "registry:5010/fn/hello:1")]);

    let err = prewarm_images(&runner, "docker", &m, &RecordingUi::default(), false)
      .await
      .unwrap_err();

    assert_eq!(err.code, ImageSyncCode::PushFailed);
    assert_eq!(err.image, "registry:5010/fn/hello:1");
  }

  #[tokio::test]
  async fn empty_manifest_is_a_no_op() {
    let runner = FakeRunner::new();
    let ui = RecordingUi::default();
    prewarm_images(&runner, "docker", &ImageImportManifest::default(), &ui, true)
      .await
      .unwrap();
    assert!(runner.calls().is_empty());
    assert!(ui.events().is_empty());
  }
}
