//! Platform directories for edgebox.

use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/"))
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  std::env::var("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Global staging root used when no template directory is known.
pub fn staging_root() -> PathBuf {
  data_dir().join("staging")
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn xdg_data_home_takes_precedence() {
    temp_env::with_vars(
      [("XDG_DATA_HOME", Some("/custom/data")), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(data_dir(), PathBuf::from("/custom/data").join(APP_NAME));
        assert_eq!(staging_root(), PathBuf::from("/custom/data").join(APP_NAME).join("staging"));
      },
    );
  }

  #[test]
  #[serial]
  fn xdg_fallback_to_home_directories() {
    temp_env::with_vars([("XDG_DATA_HOME", None::<&str>), ("HOME", Some("/home/user"))], || {
      assert_eq!(data_dir(), PathBuf::from("/home/user/.local/share").join(APP_NAME));
    });
  }
}
