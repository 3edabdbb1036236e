//! Implementation of the `edgebox apply` command.
//!
//! Lands an artifact manifest produced by an earlier `deploy --build-only` (or by another
//! machine) without running the generator.

use std::time::Instant;

use anyhow::{Context, Result};

use edgebox_lib::deploy::DeployRequest;

use super::{base_request, block_on, load_settings, workflow};
use crate::ApplyArgs;
use crate::output::{format_duration, print_stat};

pub fn cmd_apply(args: ApplyArgs, verbose: bool) -> Result<()> {
  let start = Instant::now();
  let settings = load_settings(Some(&args.target))?;

  let req = DeployRequest {
    artifact_path: Some(args.artifact),
    ..base_request(args.target, verbose)?
  };

  block_on(workflow(settings).apply(req))?.context("Apply failed")?;

  print_stat("Duration", &format_duration(start.elapsed()));
  Ok(())
}
