//! Verify command - Check that a snapshot satisfies a query

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use graphcache_config::GraphCacheConfig;
use graphcache_core::read;

use super::{cache_context, load_graph, operation, resolve_snapshot, QueryArgs};
use crate::GlobalOptions;

/// Arguments for the verify command
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Snapshot file (defaults to [persistence] snapshot_path)
    snapshot: Option<PathBuf>,

    #[command(flatten)]
    query: QueryArgs,
}

/// Execute the verify command
pub fn execute(args: VerifyArgs, config: &GraphCacheConfig, global: &GlobalOptions) -> Result<()> {
    let path = resolve_snapshot(args.snapshot, config)?;
    let context = cache_context(config);
    let graph = load_graph(&path, &context)?;
    let raw = operation(&args.query)?;

    graph
        .verify_references()
        .with_context(|| format!("Snapshot {} is inconsistent", path.display()))?;

    let result = read(&context, &raw, &graph, false).context("Failed to read query")?;
    if !result.complete {
        anyhow::bail!(
            "Snapshot {} cannot satisfy {}",
            path.display(),
            args.query.query.display()
        );
    }

    if !global.quiet {
        println!("ok: {} satisfies {}", path.display(), args.query.query.display());
    }
    Ok(())
}
