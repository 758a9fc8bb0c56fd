//! Config command - View configuration
//!
//! - Show the effective configuration after merging all sources
//! - Show where configuration files are looked up

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use graphcache_config::{ConfigLoader, GraphCacheConfig};
use serde::Serialize;

use crate::GlobalOptions;

/// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Show configuration file paths
    Path(PathArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Explicit `--config` file, which replaces both
    pub explicit: Option<PathBuf>,
    pub global_exists: bool,
    pub local_exists: bool,
}

/// Execute the config command
pub fn execute(cmd: ConfigCommand, config: &GraphCacheConfig, global: &GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, config),
        ConfigCommand::Path(args) => execute_path(args, global),
    }
}

fn execute_show(args: ShowArgs, config: &GraphCacheConfig) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!(
            "{}",
            toml::to_string_pretty(config).context("Failed to serialize configuration")?
        );
    }
    Ok(())
}

fn execute_path(args: PathArgs, global: &GlobalOptions) -> Result<()> {
    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&working_dir);
    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
        explicit: global.config.clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    println!("Configuration Paths");
    println!("===================\n");

    if let Some(ref explicit) = paths.explicit {
        println!("Explicit: {} (global and local files are ignored)", explicit.display());
    }

    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        status(paths.local_exists)
    );

    Ok(())
}

fn status(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "not found"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths_serialization() {
        let paths = ConfigPaths {
            global: Some(PathBuf::from("/home/user/.graphcache/config.toml")),
            local: PathBuf::from("/app/.graphcache/config.toml"),
            explicit: None,
            global_exists: true,
            local_exists: false,
        };

        let json = serde_json::to_string(&paths).unwrap();
        assert!(json.contains("\"global_exists\":true"));
        assert!(json.contains("\"local_exists\":false"));
        assert!(json.contains("\"explicit\":null"));
    }
}
