use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::{ConfigError, load_yaml};

/// Resource sections of `resources.yml` and the field that names each item.
pub const RESOURCE_KINDS: [(&str, &str); 3] = [("dynamodb", "TableName"), ("s3", "BucketName"), ("layers", "Name")];

/// Keyed view of a config dir, used for change summaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
  /// Function definitions by name.
  pub functions: BTreeMap<String, Value>,
  /// Routes by `path:METHOD`.
  pub routes: BTreeMap<String, Value>,
  /// Resource kind (see [`RESOURCE_KINDS`]) to items by name.
  pub resources: BTreeMap<&'static str, BTreeMap<String, Value>>,
}

/// `path:METHOD` identity of a route; the method defaults to `GET`.
pub fn route_key(route: &Mapping) -> Option<String> {
  let path = route.get("path").and_then(Value::as_str).filter(|p| !p.is_empty())?;
  let method = route
    .get("method")
    .and_then(Value::as_str)
    .filter(|m| !m.is_empty())
    .unwrap_or("GET");
  Some(format!("{}:{}", path, method))
}

fn section<'a>(doc: &'a Mapping, key: &str) -> Option<&'a Value> {
  doc.get(key)
}

/// Load a snapshot of `config_dir`. Missing files contribute nothing.
pub fn load_snapshot(config_dir: &Path) -> Result<ConfigSnapshot, ConfigError> {
  let mut snapshot = ConfigSnapshot::default();

  if let Some(doc) = load_yaml(&config_dir.join("functions.yml"))?
    && let Some(Value::Mapping(functions)) = section(&doc, "functions")
  {
    for (name, item) in functions {
      if let Some(name) = name.as_str() {
        snapshot.functions.insert(name.to_string(), item.clone());
      }
    }
  }

  if let Some(doc) = load_yaml(&config_dir.join("routing.yml"))?
    && let Some(Value::Sequence(routes)) = section(&doc, "routes")
  {
    for route in routes {
      if let Some(key) = route.as_mapping().and_then(route_key) {
        snapshot.routes.insert(key, route.clone());
      }
    }
  }

  if let Some(doc) = load_yaml(&config_dir.join("resources.yml"))?
    && let Some(Value::Mapping(resources)) = section(&doc, "resources")
  {
    for (kind, name_field) in RESOURCE_KINDS {
      let mut items = BTreeMap::new();
      if let Some(Value::Sequence(list)) = resources.get(kind) {
        for item in list {
          if let Some(name) = item.get(name_field).and_then(Value::as_str).filter(|n| !n.is_empty()) {
            items.insert(name.to_string(), item.clone());
          }
        }
      }
      snapshot.resources.insert(kind, items);
    }
  }

  Ok(snapshot)
}
