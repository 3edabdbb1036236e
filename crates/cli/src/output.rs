//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, durations, and Unicode symbols, plus the console [`UserInterface`]
//! handed to the deploy pipeline.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use edgebox_lib::ui::{KeyValue, UserInterface};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

/// First 12 characters of `hash`.
pub fn truncate_hash(hash: &str) -> &str {
  match hash.char_indices().nth(12) {
    Some((end, _)) => &hash[..end],
    None => hash,
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Terminal rendering of pipeline events.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleUi;

impl UserInterface for ConsoleUi {
  fn info(&self, message: &str) {
    print_info(message);
  }

  fn warn(&self, message: &str) {
    print_warning(message);
  }

  fn success(&self, message: &str) {
    print_success(message);
  }

  fn block(&self, icon: &str, title: &str, rows: &[KeyValue]) {
    println!();
    println!("{} {}", icon, title.if_supports_color(Stream::Stdout, |s| s.bold()));
    for row in rows {
      print_stat(&row.key, &row.value);
    }
  }
}
