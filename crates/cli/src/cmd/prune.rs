use std::sync::Arc;

use anyhow::{Context, Result};

use edgebox_lib::exec::ProcessRunner;
use edgebox_lib::fleet::{PruneOptions, prune_project};

use super::{block_on, docker_fleet, load_settings};
use crate::output::{OutputFormat, print_json, print_stat, print_success};

pub fn cmd_prune(project: &str, volumes: bool, all_images: bool, output: OutputFormat) -> Result<()> {
  let settings = load_settings(None)?;
  let fleet = docker_fleet(Arc::new(ProcessRunner), &settings);
  let options = PruneOptions { volumes, all_images };

  let outcomes = block_on(prune_project(fleet.as_ref(), project, options))?.context("Prune failed")?;

  if output.is_json() {
    return print_json(&outcomes);
  }

  print_success(&format!("Pruned project {}", project.trim()));
  for outcome in &outcomes {
    print_stat(outcome.kind, outcome.reclaimed.as_deref().unwrap_or("-"));
  }
  Ok(())
}
