mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::{OutputFormat, print_error};

/// edgebox - deploy orchestration for the edgebox serverless sandbox
#[derive(Parser)]
#[command(name = "edgebox")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate from a template and deploy the result
  Deploy(DeployArgs),

  /// Deploy a previously generated artifact manifest
  Apply(ApplyArgs),

  /// Inspect artifact manifests
  #[command(subcommand)]
  Artifact(ArtifactCommand),

  /// Remove stopped resources of a compose project
  Prune {
    /// Compose project to prune
    #[arg(short, long)]
    project: String,

    /// Also prune unused volumes
    #[arg(long)]
    volumes: bool,

    /// Remove every unused image, not only dangling ones
    #[arg(long)]
    all_images: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

#[derive(Subcommand)]
enum ArtifactCommand {
  /// Summarize an artifact manifest
  Show {
    /// Path to the artifact manifest
    path: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Compute the artifact id of a template
  Id {
    /// Template path
    #[arg(short, long)]
    template: String,

    /// Template parameter (KEY=VALUE, repeatable)
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// Template checksum; hashed from the template file when omitted
    #[arg(long)]
    sha256: Option<String>,
  },
}

/// Identity and landing options shared by `deploy` and `apply`.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
  /// Template path
  #[arg(short, long, default_value = "")]
  pub template: String,

  /// Target environment
  #[arg(short, long, default_value = "")]
  pub env: String,

  /// Runtime mode (docker or containerd)
  #[arg(long, default_value = "docker")]
  pub mode: String,

  /// Compose project name
  #[arg(short, long, default_value = "")]
  pub project: String,

  /// Project directory holding the compose files
  #[arg(long, default_value = ".")]
  pub project_dir: PathBuf,

  /// Compose file (repeatable); inferred from the running project when omitted
  #[arg(short = 'f', long = "compose-file")]
  pub compose_files: Vec<String>,

  /// Image prewarm mode (off or all)
  #[arg(long, default_value = "all")]
  pub image_prewarm: String,

  /// Secret env file required by the artifact
  #[arg(long)]
  pub secret_env: Option<PathBuf>,

  /// Do not start the provisioner's dependencies
  #[arg(long)]
  pub no_deps: bool,

  /// How long to wait for the registry (e.g. 30s, 2m)
  #[arg(long, value_parser = humantime::parse_duration)]
  pub registry_timeout: Option<Duration>,
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
  #[command(flatten)]
  pub target: TargetArgs,

  /// Generation output dir, relative to the template
  #[arg(long, default_value = "")]
  pub output_dir: String,

  /// Template parameter (KEY=VALUE, repeatable)
  #[arg(long = "param", value_parser = parse_key_val)]
  pub params: Vec<(String, String)>,

  /// Image tag for built function images
  #[arg(long, default_value = "latest")]
  pub tag: String,

  /// Build images without cache
  #[arg(long)]
  pub no_cache: bool,

  /// Stop after generation
  #[arg(long)]
  pub build_only: bool,

  /// Skip building function images
  #[arg(long)]
  pub no_build_images: bool,

  /// Require a bundle manifest in the generated output
  #[arg(long)]
  pub bundle_manifest: bool,

  /// Image source override (FUNCTION=IMAGE, repeatable)
  #[arg(long = "image-source", value_parser = parse_key_val)]
  pub image_sources: Vec<(String, String)>,

  /// Image runtime override (FUNCTION=RUNTIME, repeatable)
  #[arg(long = "image-runtime", value_parser = parse_key_val)]
  pub image_runtimes: Vec<(String, String)>,

  /// Where to write the generated artifact manifest
  #[arg(long)]
  pub artifact: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
  /// Path to the artifact manifest
  pub artifact: PathBuf,

  #[command(flatten)]
  pub target: TargetArgs,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in {:?}", s))?;
  let key = key.trim();
  if key.is_empty() {
    return Err(format!("invalid KEY=VALUE: empty key in {:?}", s));
  }
  Ok((key.to_string(), value.to_string()))
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  let result = match cli.command {
    Commands::Deploy(args) => cmd::cmd_deploy(args, cli.verbose),
    Commands::Apply(args) => cmd::cmd_apply(args, cli.verbose),
    Commands::Artifact(ArtifactCommand::Show { path, output }) => cmd::cmd_artifact_show(&path, output),
    Commands::Artifact(ArtifactCommand::Id {
      template,
      params,
      sha256,
    }) => cmd::cmd_artifact_id(&template, params, sha256.as_deref()),
    Commands::Prune {
      project,
      volumes,
      all_images,
      output,
    } => cmd::cmd_prune(&project, volumes, all_images, output),
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
