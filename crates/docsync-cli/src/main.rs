//! docsync CLI
//!
//! Command-line interface for docsync - pull, push and watch collaborative
//! documents of one workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docsync_core::SyncConfig;

mod commands;
mod output;
mod session;

use output::{Output, OutputFormat};
use session::Session;

#[derive(Parser)]
#[command(name = "docsync")]
#[command(about = "docsync - sync collaborative documents with a remote server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace id (overrides the configured one)
    #[arg(short, long, global = true)]
    workspace: Option<String>,

    /// Use read-only snapshots even if the live server is reachable
    #[arg(long = "static", global = true)]
    force_static: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the updates a local copy is missing
    Pull {
        /// Document id
        doc: String,
        /// File holding the local state vector (omit to fetch everything)
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Write the missing update to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Push a local update
    Push {
        /// Document id
        doc: String,
        /// File holding the update
        file: PathBuf,
    },
    /// Print remote updates as they arrive
    Watch,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, http_url, workspace_id, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    init_logging();

    let config_path = cli.config.as_deref();

    // Config commands don't need a server
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config = match config_path {
        Some(path) => SyncConfig::load_from_path(path),
        None => SyncConfig::load(),
    }
    .context("Failed to load configuration")?;

    let Some(workspace_id) = cli.workspace.clone().or_else(|| config.workspace_id.clone()) else {
        anyhow::bail!(
            "No workspace given. Pass --workspace or set a default with:\n  \
             docsync config set workspace_id <id>"
        );
    };

    let session = Session::open(&config, &workspace_id, cli.force_static).await?;
    tracing::debug!("Using {} sync for workspace {}", session.mode(), workspace_id);

    let storage = session.storage();
    let result = match cli.command {
        Commands::Pull { doc, state, out } => {
            commands::pull::pull(storage, &doc, state.as_deref(), out.as_deref(), &output).await
        }
        Commands::Push { doc, file } => commands::push::push(storage, &doc, &file, &output).await,
        Commands::Watch => commands::watch::watch(storage, output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    session.close().await;
    result
}

/// Log to stderr, filtered by RUST_LOG
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docsync_core=info,docsync_cli=info"));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
