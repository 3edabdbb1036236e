use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_yaml::Value;

use super::{ConfigSnapshot, RESOURCE_KINDS};

/// Change counts between two keyed maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
  pub added: usize,
  pub updated: usize,
  pub removed: usize,
  /// Number of keys after the change.
  pub total: usize,
}

impl Counts {
  pub fn is_zero(&self) -> bool {
    *self == Counts::default()
  }

  /// `new A / updated U / removed R (total T)`
  pub fn merge_label(&self) -> String {
    format!(
      "new {} / updated {} / removed {} (total {})",
      self.added, self.updated, self.removed, self.total
    )
  }

  /// `new A / updated U / unchanged X (template T)`
  pub fn template_label(&self) -> String {
    let unchanged = self.total.saturating_sub(self.added + self.updated);
    let mut out = String::new();
    let _ = write!(
      out,
      "new {} / updated {} / unchanged {} (template {})",
      self.added, self.updated, unchanged, self.total
    );
    out
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiff {
  pub functions: Counts,
  pub routes: Counts,
  pub resources: BTreeMap<&'static str, Counts>,
}

fn diff_map(before: &BTreeMap<String, Value>, after: &BTreeMap<String, Value>) -> Counts {
  let mut counts = Counts {
    total: after.len(),
    ..Counts::default()
  };
  for (key, value) in after {
    match before.get(key) {
      None => counts.added += 1,
      Some(prev) if prev != value => counts.updated += 1,
      Some(_) => {}
    }
  }
  counts.removed = before.keys().filter(|k| !after.contains_key(*k)).count();
  counts
}

pub fn diff_snapshots(before: &ConfigSnapshot, after: &ConfigSnapshot) -> ConfigDiff {
  let empty = BTreeMap::new();
  let resources = RESOURCE_KINDS
    .iter()
    .map(|(kind, _)| {
      let b = before.resources.get(kind).unwrap_or(&empty);
      let a = after.resources.get(kind).unwrap_or(&empty);
      (*kind, diff_map(b, a))
    })
    .collect();
  ConfigDiff {
    functions: diff_map(&before.functions, &after.functions),
    routes: diff_map(&before.routes, &after.routes),
    resources,
  }
}
