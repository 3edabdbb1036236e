//! Implementation of the `edgebox deploy` command.
//!
//! Generates runtime config from a template with the configured generator, writes the
//! artifact manifest, and unless `--build-only` is given lands it on the running fleet.

use std::time::Instant;

use anyhow::{Context, Result};

use edgebox_lib::deploy::DeployRequest;

use super::{base_request, block_on, load_settings, to_map, workflow};
use crate::DeployArgs;
use crate::output::{format_duration, print_stat};

pub fn cmd_deploy(args: DeployArgs, verbose: bool) -> Result<()> {
  let start = Instant::now();
  let settings = load_settings(Some(&args.target))?;
  let build_only = args.build_only;

  let req = DeployRequest {
    output_dir: args.output_dir,
    parameters: to_map(args.params),
    tag: args.tag,
    no_cache: args.no_cache,
    build_only,
    build_images: args.no_build_images.then_some(false),
    bundle_manifest: args.bundle_manifest,
    image_sources: to_map(args.image_sources),
    image_runtimes: to_map(args.image_runtimes),
    artifact_path: args.artifact,
    ..base_request(args.target, verbose)?
  };

  let workflow = workflow(settings);
  let label = if build_only { "Build failed" } else { "Deploy failed" };
  block_on(workflow.run(req))?.context(label)?;

  print_stat("Duration", &format_duration(start.elapsed()));
  Ok(())
}
