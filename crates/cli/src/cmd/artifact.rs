use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use edgebox_lib::artifact::{compute_artifact_id, read_manifest, resolve_entry_paths};
use edgebox_lib::util::hash::hash_file;

use crate::output::{OutputFormat, print_info, print_json, print_stat, truncate_hash};

pub fn cmd_artifact_show(path: &Path, output: OutputFormat) -> Result<()> {
  let manifest = read_manifest(path).context("Failed to load artifact manifest")?;

  if output.is_json() {
    return print_json(&manifest);
  }

  print_info(&format!("Artifact manifest {}", path.display()));
  print_stat("Project", &manifest.project);
  print_stat("Env", &manifest.env);
  print_stat("Mode", &manifest.mode);
  if let Some(stack) = &manifest.runtime_stack {
    print_stat("Runtime stack", format!("{} {}", stack.mode, stack.version).trim_end());
  }
  if let Some(generator) = &manifest.generator {
    print_stat("Generator", format!("{} {}", generator.name, generator.version).trim_end());
  }
  if !manifest.generated_at.is_empty() {
    print_stat("Generated", &manifest.generated_at);
  }

  for entry in &manifest.artifacts {
    println!();
    println!("  {}", truncate_hash(&entry.id));
    let paths = resolve_entry_paths(path, entry)?;
    print_stat("Config", &paths.runtime_config_dir.display().to_string());
    if let Some(bundle) = &paths.bundle_manifest {
      print_stat("Bundle", &bundle.display().to_string());
    }
    if let Some(source) = &entry.source_template {
      print_stat("Template", &source.path);
    }
    if !entry.required_secret_env.is_empty() {
      print_stat("Secrets", &entry.required_secret_env.join(", "));
    }
  }

  Ok(())
}

pub fn cmd_artifact_id(template: &str, params: Vec<(String, String)>, sha256: Option<&str>) -> Result<()> {
  let checksum = match sha256 {
    Some(sum) => sum.trim().to_string(),
    None => hash_file(Path::new(template)).context("Failed to hash template")?.0,
  };
  let params: BTreeMap<String, String> = params.into_iter().collect();
  println!("{}", compute_artifact_id(template, &params, &checksum));
  Ok(())
}
