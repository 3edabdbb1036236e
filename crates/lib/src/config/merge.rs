//! Last-write-wins merge of one config dir into another.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::{
  ConfigError, ImageImportManifest, RESOURCE_KINDS, load_yaml, read_image_import, route_key, write_image_import,
  write_yaml,
};
use crate::consts::IMAGE_IMPORT_FILE;

/// Merge the config files of `src_dir` into `dest_dir`.
///
/// Files missing from `src_dir` leave their counterpart untouched. Every rewritten file is
/// replaced atomically.
pub fn merge_config_dir(src_dir: &Path, dest_dir: &Path) -> Result<(), ConfigError> {
  std::fs::create_dir_all(dest_dir).map_err(|source| ConfigError::Write {
    path: dest_dir.to_path_buf(),
    source,
  })?;
  merge_functions(src_dir, dest_dir)?;
  merge_routing(src_dir, dest_dir)?;
  merge_resources(src_dir, dest_dir)?;
  merge_image_import(src_dir, dest_dir)?;
  Ok(())
}

fn mapping_of(doc: &Mapping, key: &str) -> Mapping {
  doc.get(key).and_then(Value::as_mapping).cloned().unwrap_or_default()
}

fn sequence_of(doc: &Mapping, key: &str) -> Vec<Value> {
  doc.get(key).and_then(Value::as_sequence).cloned().unwrap_or_default()
}

/// Copy keys of `src` missing from `dest`.
fn fill_missing(dest: &mut Mapping, src: &Mapping) {
  for (key, value) in src {
    if !dest.contains_key(key) {
      dest.insert(key.clone(), value.clone());
    }
  }
}

fn merge_functions(src_dir: &Path, dest_dir: &Path) -> Result<(), ConfigError> {
  let Some(src) = load_yaml(&src_dir.join("functions.yml"))? else {
    return Ok(());
  };
  let dest_path = dest_dir.join("functions.yml");
  let existing = load_yaml(&dest_path)?.unwrap_or_default();

  let mut functions = mapping_of(&existing, "functions");
  for (name, def) in mapping_of(&src, "functions") {
    functions.insert(name, def);
  }

  let src_defaults = mapping_of(&src, "defaults");
  let mut defaults = mapping_of(&existing, "defaults");
  for section in ["environment", "scaling"] {
    let Some(src_section) = src_defaults.get(section).and_then(Value::as_mapping) else {
      continue;
    };
    let mut merged = mapping_of(&defaults, section);
    fill_missing(&mut merged, src_section);
    if !merged.is_empty() {
      defaults.insert(Value::from(section), Value::Mapping(merged));
    }
  }
  for (key, value) in &src_defaults {
    if matches!(key.as_str(), Some("environment" | "scaling")) {
      continue;
    }
    if !defaults.contains_key(key) {
      defaults.insert(key.clone(), value.clone());
    }
  }

  let mut merged = Mapping::new();
  merged.insert(Value::from("functions"), Value::Mapping(functions));
  if !defaults.is_empty() {
    merged.insert(Value::from("defaults"), Value::Mapping(defaults));
  }
  debug!(path = %dest_path.display(), "merged functions");
  write_yaml(&dest_path, &merged)
}

fn merge_routing(src_dir: &Path, dest_dir: &Path) -> Result<(), ConfigError> {
  let Some(src) = load_yaml(&src_dir.join("routing.yml"))? else {
    return Ok(());
  };
  let dest_path = dest_dir.join("routing.yml");
  let existing = load_yaml(&dest_path)?.unwrap_or_default();

  let mut routes = sequence_of(&existing, "routes");
  let mut index: BTreeMap<String, usize> = routes
    .iter()
    .enumerate()
    .filter_map(|(i, r)| r.as_mapping().and_then(route_key).map(|k| (k, i)))
    .collect();

  for route in sequence_of(&src, "routes") {
    let Some(key) = route.as_mapping().and_then(route_key) else {
      continue;
    };
    match index.get(&key) {
      Some(&i) => routes[i] = route,
      None => {
        routes.push(route);
        index.insert(key, routes.len() - 1);
      }
    }
  }

  let mut merged = Mapping::new();
  merged.insert(Value::from("routes"), Value::Sequence(routes));
  write_yaml(&dest_path, &merged)
}

fn merge_named(existing: Vec<Value>, incoming: Vec<Value>, name_field: &str) -> Vec<Value> {
  let name_of = |v: &Value| {
    v.get(name_field)
      .and_then(Value::as_str)
      .filter(|n| !n.is_empty())
      .map(str::to_string)
  };
  let mut out = existing;
  for item in incoming {
    let Some(name) = name_of(&item) else {
      continue;
    };
    match out.iter().position(|v| name_of(v).as_deref() == Some(name.as_str())) {
      Some(i) => out[i] = item,
      None => out.push(item),
    }
  }
  out
}

fn merge_resources(src_dir: &Path, dest_dir: &Path) -> Result<(), ConfigError> {
  let Some(src) = load_yaml(&src_dir.join("resources.yml"))? else {
    return Ok(());
  };
  let dest_path = dest_dir.join("resources.yml");
  let existing = load_yaml(&dest_path)?.unwrap_or_default();

  let src_resources = mapping_of(&src, "resources");
  let mut resources = mapping_of(&existing, "resources");
  for (kind, name_field) in RESOURCE_KINDS {
    let merged = merge_named(sequence_of(&resources, kind), sequence_of(&src_resources, kind), name_field);
    if !merged.is_empty() {
      resources.insert(Value::from(kind), Value::Sequence(merged));
    }
  }

  let mut merged = Mapping::new();
  merged.insert(Value::from("resources"), Value::Mapping(resources));
  write_yaml(&dest_path, &merged)
}

fn merge_image_import(src_dir: &Path, dest_dir: &Path) -> Result<(), ConfigError> {
  let Some(src) = read_image_import(&src_dir.join(IMAGE_IMPORT_FILE))? else {
    return Ok(());
  };
  let dest_path = dest_dir.join(IMAGE_IMPORT_FILE);
  let existing = read_image_import(&dest_path)?.unwrap_or_default();

  let first_non_empty = |a: &str, b: &str| {
    [a, b]
      .into_iter()
      .map(str::trim)
      .find(|v| !v.is_empty())
      .map(str::to_string)
  };

  let mut images = BTreeMap::new();
  for entry in existing.images.into_iter().chain(src.images) {
    let key = entry.function_name.trim().to_string();
    if !key.is_empty() {
      images.insert(key, entry);
    }
  }

  let merged = ImageImportManifest {
    version: first_non_empty(&src.version, &existing.version).unwrap_or_else(|| "1".to_string()),
    push_target: first_non_empty(&src.push_target, &existing.push_target).unwrap_or_default(),
    images: images.into_values().collect(),
  };
  write_image_import(&dest_path, &merged)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::load_snapshot;
  use std::fs;
  use tempfile::TempDir;

  fn write(dir: &Path, name: &str, contents: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
  }

  fn read_yaml(path: &Path) -> Mapping {
    serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
  }

  #[test]
  fn functions_last_write_wins_and_defaults_fill() {
    let tmp = TempDir::new().unwrap();
    let (src, dest) = (tmp.path().join("src"), tmp.path().join("dest"));
    write(
      &dest,
      "functions.yml",
      "functions:\n  a:\n    memory: 128\n  b:\n    memory: 128\ndefaults:\n  timeout: 30\n  environment:\n    LOG_LEVEL: info\n",
    );
    write(
      &src,
      "functions.yml",
      "functions:\n  b:\n    memory: 512\n  c:\n    memory: 256\ndefaults:\n  timeout: 60\n  runtime: python3.12\n  environment:\n    LOG_LEVEL: debug\n    REGION: local\n  scaling:\n    max: 4\n",
    );

    merge_config_dir(&src, &dest).unwrap();
    let merged = read_yaml(&dest.join("functions.yml"));

    let functions = merged["functions"].as_mapping().unwrap();
    assert_eq!(functions.len(), 3);
    assert_eq!(merged["functions"]["b"]["memory"], Value::from(512));

    let defaults = &merged["defaults"];
    assert_eq!(defaults["timeout"], Value::from(30));
    assert_eq!(defaults["runtime"], Value::from("python3.12"));
    assert_eq!(defaults["environment"]["LOG_LEVEL"], Value::from("info"));
    assert_eq!(defaults["environment"]["REGION"], Value::from("local"));
    assert_eq!(defaults["scaling"]["max"], Value::from(4));
  }

  #[test]
  fn routes_update_in_place_and_append() {
    let tmp = TempDir::new().unwrap();
    let (src, dest) = (tmp.path().join("src"), tmp.path().join("dest"));
    write(
      &dest,
      "routing.yml",
      "routes:\n  - path: /a\n    function: old\n  - path: /b\n    function: b\n",
    );
    write(
      &src,
      "routing.yml",
      "routes:\n  - path: /a\n    method: GET\n    function: new\n  - path: /c\n    function: c\n  - function: nameless\n",
    );

    merge_config_dir(&src, &dest).unwrap();
    let merged = read_yaml(&dest.join("routing.yml"));
    let routes = merged["routes"].as_sequence().unwrap();
    let functions: Vec<_> = routes.iter().map(|r| r["function"].as_str().unwrap()).collect();
    assert_eq!(functions, vec!["new", "b", "c"]);
  }

  #[test]
  fn resources_merge_by_name_field() {
    let tmp = TempDir::new().unwrap();
    let (src, dest) = (tmp.path().join("src"), tmp.path().join("dest"));
    write(
      &dest,
      "resources.yml",
      "resources:\n  dynamodb:\n    - TableName: users\n      BillingMode: PROVISIONED\n  layers:\n    - Name: common\n",
    );
    write(
      &src,
      "resources.yml",
      "resources:\n  dynamodb:\n    - TableName: users\n      BillingMode: PAY_PER_REQUEST\n  s3:\n    - BucketName: uploads\n",
    );

    merge_config_dir(&src, &dest).unwrap();
    let snapshot = load_snapshot(&dest).unwrap();
    assert_eq!(
      snapshot.resources["dynamodb"]["users"]["BillingMode"],
      Value::from("PAY_PER_REQUEST")
    );
    assert!(snapshot.resources["s3"].contains_key("uploads"));
    assert!(snapshot.resources["layers"].contains_key("common"));
  }

  #[test]
  fn missing_source_files_leave_destination_untouched() {
    let tmp = TempDir::new().unwrap();
    let (src, dest) = (tmp.path().join("src"), tmp.path().join("dest"));
    fs::create_dir_all(&src).unwrap();
    write(&dest, "routing.yml", "# hand edited\nroutes: []\n");

    merge_config_dir(&src, &dest).unwrap();
    assert_eq!(
      fs::read_to_string(dest.join("routing.yml")).unwrap(),
      "# hand edited\nroutes: []\n"
    );
    assert!(!dest.join("functions.yml").exists());
  }

  #[test]
  fn image_import_merges_by_function_name() {
    let tmp = TempDir::new().unwrap();
    let (src, dest) = (tmp.path().join("src"), tmp.path().join("dest"));
    write(
      &dest,
      IMAGE_IMPORT_FILE,
      r#"{"version":"1","push_target":"registry:5010","images":[
        {"function_name":"b","image_source":"docker.io/b:1","image_ref":"registry:5010/b:1"},
        {"function_name":"a","image_source":"docker.io/a:1","image_ref":"registry:5010/a:1"}]}"#,
    );
    write(
      &src,
      IMAGE_IMPORT_FILE,
      r#"{"version":"1","images":[
        {"function_name":"a","image_source":"docker.io/a:2","image_ref":"registry:5010/a:2"}]}"#,
    );

    merge_config_dir(&src, &dest).unwrap();
    let merged = read_image_import(&dest.join(IMAGE_IMPORT_FILE)).unwrap().unwrap();
    assert_eq!(merged.push_target, "registry:5010");
    let names: Vec<_> = merged.images.iter().map(|e| e.function_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(merged.images[0].image_source, "docker.io/a:2");
  }
}
