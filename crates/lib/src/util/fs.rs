//! Filesystem helpers.
//!
//! Every file edgebox writes goes through a temp sibling that is flushed and renamed over the
//! destination, so readers never observe a partially written file.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path};

use tempfile::Builder;

fn parent_dir(path: &Path) -> &Path {
  match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
  Ok(())
}

/// Write `contents` to `path` atomically.
///
/// The temp file is created in the destination directory with the given name prefix,
/// synced, chmod'ed to 0644 and renamed. On failure the temp file is removed and the
/// destination is left untouched.
pub fn write_atomic(path: &Path, contents: &[u8], prefix: &str) -> io::Result<()> {
  let dir = parent_dir(path);
  fs::create_dir_all(dir)?;

  let mut tmp = Builder::new().prefix(prefix).tempfile_in(dir)?;
  tmp.write_all(contents)?;
  tmp.as_file().sync_all()?;
  set_mode(tmp.path(), 0o644)?;
  tmp.persist(path).map_err(|e| e.error)?;
  Ok(())
}

/// Copy `src` over `dest` atomically via a `.<name>.tmp-*` sibling.
pub fn copy_file_atomic(src: &Path, dest: &Path) -> io::Result<()> {
  let mut input = fs::File::open(src)?;
  let dir = parent_dir(dest);
  fs::create_dir_all(dir)?;

  let name = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
  let mut tmp = Builder::new().prefix(&format!(".{}.tmp-", name)).tempfile_in(dir)?;
  io::copy(&mut input, tmp.as_file_mut())?;
  tmp.as_file().sync_all()?;
  tmp.persist(dest).map_err(|e| e.error)?;
  Ok(())
}

/// Lexically normalize a path: drop `.` segments and fold `..` into the preceding segment.
///
/// Separators are normalized to `/`. Leading `..` segments of relative paths are kept.
/// `./a/../b` and `b` normalize to the same string; an empty result becomes `.`.
pub fn normalize_lexical(path: &str) -> String {
  let unified = path.trim().replace('\\', "/");
  let mut parts: Vec<String> = Vec::new();
  let mut absolute = false;

  for component in Path::new(&unified).components() {
    match component {
      Component::RootDir => absolute = true,
      Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().into_owned()),
      Component::CurDir => {}
      Component::ParentDir => match parts.last() {
        Some(last) if last != ".." => {
          parts.pop();
        }
        _ if absolute => {}
        _ => parts.push("..".to_string()),
      },
      Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
    }
  }

  let joined = parts.join("/");
  match (absolute, joined.is_empty()) {
    (true, _) => format!("/{}", joined),
    (false, true) => ".".to_string(),
    (false, false) => joined,
  }
}

/// Whether two paths point at the same location.
///
/// Both sides are canonicalized when they exist; otherwise they are compared as absolute,
/// lexically normalized paths.
pub fn same_path(left: &Path, right: &Path) -> bool {
  if let (Ok(l), Ok(r)) = (dunce::canonicalize(left), dunce::canonicalize(right)) {
    return l == r;
  }
  match (std::path::absolute(left), std::path::absolute(right)) {
    (Ok(l), Ok(r)) => normalize_lexical(&l.to_string_lossy()) == normalize_lexical(&r.to_string_lossy()),
    _ => false,
  }
}

/// Path of `target` relative to `base`, `/`-separated. Both are made absolute first.
///
/// Falls back to the normalized absolute target when the two share no root (e.g. different
/// drives).
pub fn relative_path(base: &Path, target: &Path) -> io::Result<String> {
  let base = normalize_lexical(&std::path::absolute(base)?.to_string_lossy());
  let target = normalize_lexical(&std::path::absolute(target)?.to_string_lossy());

  let base_parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
  let target_parts: Vec<&str> = target.split('/').filter(|p| !p.is_empty()).collect();
  if base_parts.first() != target_parts.first() && target_parts.first().is_some_and(|p| p.ends_with(':')) {
    return Ok(target);
  }

  let common = base_parts
    .iter()
    .zip(&target_parts)
    .take_while(|(a, b)| a == b)
    .count();
  let mut parts: Vec<&str> = std::iter::repeat_n("..", base_parts.len() - common).collect();
  parts.extend(&target_parts[common..]);
  if parts.is_empty() {
    return Ok(".".to_string());
  }
  Ok(parts.join("/"))
}
