//! Config change summaries printed around generation.

use std::path::Path;

use crate::config::{ConfigDiff, ConfigSnapshot, Counts, diff_snapshots, load_snapshot};
use crate::ui::{KeyValue, UserInterface};

/// Snapshot of the staging config before it is touched. Read failures degrade to an empty
/// snapshot.
pub(crate) fn snapshot_staging(ui: &dyn UserInterface, staging_dir: &Path) -> ConfigSnapshot {
  load_snapshot(staging_dir).unwrap_or_else(|e| {
    ui.warn(&format!("failed to read existing config: {}", e));
    ConfigSnapshot::default()
  })
}

fn rows(diff: &ConfigDiff, label: fn(&Counts) -> String) -> Vec<KeyValue> {
  let mut rows = vec![
    KeyValue::new("Routes", label(&diff.routes)),
    KeyValue::new("Functions", label(&diff.functions)),
  ];
  for (kind, counts) in &diff.resources {
    if !counts.is_zero() {
      rows.push(KeyValue::new(format!("Resources.{}", kind), label(counts)));
    }
  }
  rows
}

/// What generation produced compared with what is staged.
pub(crate) fn report_template_delta(ui: &dyn UserInterface, template_config_dir: &Path, before: &ConfigSnapshot) {
  let template = match load_snapshot(template_config_dir) {
    Ok(snapshot) => snapshot,
    Err(e) => {
      ui.warn(&format!("failed to read template config: {}", e));
      return;
    }
  };
  let diff = diff_snapshots(before, &template);
  let mut block = vec![KeyValue::new("Template config", template_config_dir.display().to_string())];
  block.extend(rows(&diff, Counts::template_label));
  ui.block("🧾", "Template delta summary", &block);
}

/// How the staged config changed.
pub(crate) fn report_merge(ui: &dyn UserInterface, staging_dir: &Path, before: &ConfigSnapshot) {
  let merged = match load_snapshot(staging_dir) {
    Ok(snapshot) => snapshot,
    Err(e) => {
      ui.warn(&format!("failed to read merged config: {}", e));
      return;
    }
  };
  let diff = diff_snapshots(before, &merged);
  let mut block = vec![KeyValue::new("Staging config", staging_dir.display().to_string())];
  block.extend(rows(&diff, Counts::merge_label));
  ui.block("🧩", "Config merge summary", &block);
}
