//! User-facing reporting.
//!
//! The pipeline never prints directly; it reports through a [`UserInterface`] supplied by the
//! caller. Implementations are purely observational and cannot fail.

/// One labelled row of a summary block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
  pub key: String,
  pub value: String,
}

impl KeyValue {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }
}

pub trait UserInterface: Send + Sync {
  fn info(&self, message: &str);
  fn warn(&self, message: &str);
  fn success(&self, message: &str);
  /// A titled group of key/value rows, e.g. a config delta summary.
  fn block(&self, icon: &str, title: &str, rows: &[KeyValue]);
}
