//! relaunch — command-line entry point.
//!
//! Runs replacement invocations against a JSON world file through the
//! in-memory collaborator, and reports what each group would do next.
//!
//! # Usage
//!
//! ```text
//! relaunch invoke --world fleet.json --group web --write-back
//! relaunch invoke --world fleet.json --event event.json --dry-run
//! relaunch status --world fleet.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use relaunch_core::config::{LogFormat, LoggingConfig};
use relaunch_core::RelaunchConfig;

mod commands;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "relaunch.toml";

#[derive(Parser)]
#[command(
    name = "relaunch",
    about = "Rolling replacement of outdated autoscaling group instances",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to relaunch.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log format: text or json (overrides the config file)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one invocation: resolve the event, then take one step per group
    Invoke {
        /// JSON world file describing groups and attachment health
        #[arg(short, long)]
        world: PathBuf,
        /// JSON event record ({"detail": {...}})
        #[arg(long, conflicts_with_all = ["group", "instance"])]
        event: Option<PathBuf>,
        /// Reconcile this group
        #[arg(long, conflicts_with = "instance")]
        group: Option<String>,
        /// Reconcile the group owning this instance
        #[arg(long)]
        instance: Option<String>,
        /// Log mutations instead of applying them
        #[arg(long)]
        dry_run: bool,
        /// Save the mutated fleet back to the world file
        #[arg(long, conflicts_with = "dry_run")]
        write_back: bool,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show each group's instance statuses and next step
    Status {
        #[arg(short, long)]
        world: PathBuf,
        #[arg(long)]
        group: Option<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Manage relaunch.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a default relaunch.toml
    Init,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(format) = cli.log_format.as_deref() {
        config.logging.format = parse_log_format(format)?;
    }
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Invoke {
            world,
            event,
            group,
            instance,
            dry_run,
            write_back,
            format,
        } => commands::invoke::invoke(
            &config,
            &commands::invoke::InvokeArgs {
                world,
                event,
                group,
                instance,
                dry_run,
                write_back,
                format,
            },
        ),
        Commands::Status {
            world,
            group,
            format,
        } => commands::status::status(&config, &world, group.as_deref(), &format),
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config::init(),
        },
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RelaunchConfig> {
    match path {
        Some(path) => RelaunchConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            RelaunchConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("loading config {DEFAULT_CONFIG}"))
        }
        None => Ok(RelaunchConfig::default()),
    }
}

fn parse_log_format(value: &str) -> anyhow::Result<LogFormat> {
    match value {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => anyhow::bail!("unknown log format: {other} (expected text or json)"),
    }
}

/// Logs go to stderr so stdout stays a clean report.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("invalid log level {:?}", logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
