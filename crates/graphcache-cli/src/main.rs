//! GraphCache CLI - Inspect and edit persisted cache snapshots
//!
//! A command-line interface for reading, writing, pruning and verifying
//! serialized normalized caches.
//!
//! # Usage
//!
//! ```bash
//! # Summarize a snapshot
//! graphcache inspect cache.json
//!
//! # Read a query from it
//! graphcache read cache.json --query viewer.graphql
//!
//! # Merge a payload into it
//! graphcache write cache.json --query viewer.graphql --payload response.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use graphcache_config::{ConfigOverrides, GraphCacheConfig, LogFormat};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// GraphCache - Normalized object-graph cache tooling
#[derive(Parser, Debug)]
#[command(name = "graphcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "GRAPHCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Check reference symmetry after every edit
    #[arg(long, global = true)]
    verify_snapshots: bool,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            verbose: self.verbose.then_some(true),
            verify_snapshots: self.verify_snapshots.then_some(true),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show node counts, orphans and reference consistency
    Inspect(commands::inspect::InspectArgs),

    /// Read a query from a snapshot
    Read(commands::read::ReadArgs),

    /// Merge a query payload into a snapshot
    Write(commands::write::WriteArgs),

    /// Keep only the nodes a query selects
    Prune(commands::prune::PruneArgs),

    /// Check that a snapshot can satisfy a query
    Verify(commands::verify::VerifyArgs),

    /// View configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn init_logging(global: &GlobalOptions, config: &GraphCacheConfig) -> Result<()> {
    let log_level = if global.quiet {
        Level::ERROR
    } else if global.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?
        }
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(&cli.global)?;
    init_logging(&cli.global, &config)?;

    match cli.command {
        Commands::Inspect(args) => commands::inspect::execute(args, &config, &cli.global),
        Commands::Read(args) => commands::read::execute(args, &config, &cli.global),
        Commands::Write(args) => commands::write::execute(args, &config, &cli.global),
        Commands::Prune(args) => commands::prune::execute(args, &config, &cli.global),
        Commands::Verify(args) => commands::verify::execute(args, &config, &cli.global),
        Commands::Config(cmd) => commands::config::execute(cmd, &config, &cli.global),
    }
}
