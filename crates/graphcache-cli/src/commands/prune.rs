//! Prune command - Keep only what a query selects

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use graphcache_config::GraphCacheConfig;
use graphcache_core::prune;

use super::{
    cache_context, load_graph, operation, print_info, resolve_snapshot, save_graph,
    serialize_graph, QueryArgs,
};
use crate::GlobalOptions;

/// Arguments for the prune command
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Snapshot file (defaults to [persistence] snapshot_path)
    snapshot: Option<PathBuf>,

    #[command(flatten)]
    query: QueryArgs,

    /// Save the pruned snapshot here instead of printing it
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,
}

/// Execute the prune command
pub fn execute(args: PruneArgs, config: &GraphCacheConfig, global: &GlobalOptions) -> Result<()> {
    let path = resolve_snapshot(args.snapshot, config)?;
    let context = cache_context(config);
    let graph = load_graph(&path, &context)?;
    let raw = operation(&args.query)?;

    let pruned = prune(&context, &graph, &raw).context("Failed to prune snapshot")?;
    if !pruned.complete {
        tracing::warn!("Query is not fully satisfied; the pruned snapshot is partial");
    }

    match args.output {
        Some(output) => {
            save_graph(&pruned.snapshot, &output, config.persistence.pretty)?;
            print_info(
                &format!(
                    "Pruned {} nodes to {} in {}",
                    graph.len(),
                    pruned.snapshot.len(),
                    output.display()
                ),
                global.quiet,
            );
        }
        None => println!(
            "{}",
            serialize_graph(&pruned.snapshot, config.persistence.pretty)?
        ),
    }

    Ok(())
}
