//! External command execution.
//!
//! Every call edgebox makes to the container supervisor, the docker CLI or the generator goes
//! through a [`CommandRunner`]. The default [`ProcessRunner`] spawns real processes with
//! `tokio::process`; tests substitute a recording fake.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// A single program invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub current_dir: Option<PathBuf>,
  /// Extra variables layered over the inherited environment.
  pub env: BTreeMap<String, String>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Self::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.current_dir = Some(dir.into());
    self
  }

  pub fn envs<I, K, V>(mut self, vars: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    self.env.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
    self
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " {:?}", arg)?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// Errors returned by a [`CommandRunner`].
#[derive(Debug, Error)]
pub enum CommandError {
  /// The process ran and exited unsuccessfully. `output` holds combined stdout and stderr.
  #[error("{command} failed (exit {}){}", exit_label(code), tail(output))]
  Failed {
    command: String,
    code: Option<i32>,
    output: String,
  },

  /// The process could not be started.
  #[error("failed to start {command}: {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },
}

fn exit_label(code: &Option<i32>) -> String {
  code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string())
}

fn tail(output: &str) -> String {
  let trimmed = output.trim();
  if trimmed.is_empty() {
    String::new()
  } else {
    format!(": {}", trimmed)
  }
}

impl CommandError {
  /// Combined output captured from a failed process, empty for spawn failures.
  pub fn output(&self) -> &str {
    match self {
      CommandError::Failed { output, .. } => output,
      CommandError::Spawn { .. } => "",
    }
  }
}

/// Runs external programs on behalf of the deploy pipeline.
#[async_trait]
pub trait CommandRunner: Send + Sync {
  /// Run with stdout/stderr inherited from the current process.
  async fn run(&self, invocation: &Invocation) -> Result<(), CommandError>;

  /// Run and return captured stdout.
  async fn run_output(&self, invocation: &Invocation) -> Result<Vec<u8>, CommandError>;

  /// Run with output captured and only surfaced on failure.
  async fn run_quiet(&self, invocation: &Invocation) -> Result<(), CommandError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
  fn command(invocation: &Invocation) -> Command {
    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).kill_on_drop(true);
    if let Some(dir) = &invocation.current_dir {
      command.current_dir(dir);
    }
    for (key, value) in &invocation.env {
      command.env(key, value);
    }
    command
  }

  async fn capture(invocation: &Invocation) -> Result<std::process::Output, CommandError> {
    debug!(command = %invocation, "spawning process");
    let output = Self::command(invocation)
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|source| CommandError::Spawn {
        command: invocation.to_string(),
        source,
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let stdout = String::from_utf8_lossy(&output.stdout);
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "command stderr");
      }
      let mut combined = stdout.into_owned();
      combined.push_str(&stderr);
      return Err(CommandError::Failed {
        command: invocation.to_string(),
        code: output.status.code(),
        output: combined,
      });
    }
    Ok(output)
  }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
  async fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
    debug!(command = %invocation, "spawning process");
    let status = Self::command(invocation)
      .status()
      .await
      .map_err(|source| CommandError::Spawn {
        command: invocation.to_string(),
        source,
      })?;
    if !status.success() {
      return Err(CommandError::Failed {
        command: invocation.to_string(),
        code: status.code(),
        output: String::new(),
      });
    }
    Ok(())
  }

  async fn run_output(&self, invocation: &Invocation) -> Result<Vec<u8>, CommandError> {
    let output = Self::capture(invocation).await?;
    Ok(output.stdout)
  }

  async fn run_quiet(&self, invocation: &Invocation) -> Result<(), CommandError> {
    Self::capture(invocation).await.map(|_| ())
  }
}
