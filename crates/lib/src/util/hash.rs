//! Hashing utilities for content-addressed artifacts.
//!
//! This module provides:
//! - `ContentHash`: A full 64-character sha256 hash
//! - `hash_file()`: Single file hashing (template checksums)
//! - `hash_bytes()`: Arbitrary byte hashing (artifact ids)

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character sha256 hash.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while hashing a file.
#[derive(Debug, thiserror::Error)]
#[error("failed to read file {}: {source}", path.display())]
pub struct FileHashError {
  pub path: PathBuf,
  #[source]
  pub source: std::io::Error,
}

/// Hash a file's contents.
///
/// Returns the full 64-character sha256 hash of the file.
pub fn hash_file(path: &Path) -> Result<ContentHash, FileHashError> {
  let read_err = |source| FileHashError {
    path: path.to_path_buf(),
    source,
  };
  let mut file = fs::File::open(path).map_err(read_err)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}
