use std::collections::BTreeMap;

use crate::util::fs::normalize_lexical;
use crate::util::hash::hash_bytes;

/// Deterministic id for an artifact entry.
///
/// A sha256 over the lexically normalized template path, the parameter map (sorted by key)
/// and the template checksum. Each field is length-prefixed so that no two distinct inputs
/// share an encoding.
pub fn compute_artifact_id(template_path: &str, parameters: &BTreeMap<String, String>, checksum: &str) -> String {
  let mut buf = Vec::new();
  let mut push = |field: &str| {
    buf.extend_from_slice(&(field.len() as u64).to_be_bytes());
    buf.extend_from_slice(field.as_bytes());
  };

  push(&normalize_lexical(template_path));
  push(&parameters.len().to_string());
  for (key, value) in parameters {
    push(key);
    push(value);
  }
  push(checksum.trim());

  hash_bytes(&buf).0
}
