//! Write command - Merge a payload into a snapshot

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use graphcache_config::GraphCacheConfig;
use graphcache_core::{write, Value};
use serde::Serialize;

use super::{
    cache_context, load_graph, operation, print_info, resolve_snapshot, save_graph, QueryArgs,
};
use crate::GlobalOptions;

/// Arguments for the write command
#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Snapshot file (defaults to [persistence] snapshot_path)
    snapshot: Option<PathBuf>,

    #[command(flatten)]
    query: QueryArgs,

    /// JSON file holding the query's response data
    #[arg(long, value_name = "FILE")]
    payload: PathBuf,

    /// Save the result here instead of over the snapshot
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,
}

/// What a write changed
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub edited: Vec<String>,
    pub warnings: Vec<String>,
}

/// Execute the write command
pub fn execute(args: WriteArgs, config: &GraphCacheConfig, global: &GlobalOptions) -> Result<()> {
    let path = resolve_snapshot(args.snapshot, config)?;
    let context = cache_context(config);
    let graph = load_graph(&path, &context)?;
    let raw = operation(&args.query)?;

    let payload_text = std::fs::read_to_string(&args.payload)
        .with_context(|| format!("Failed to read payload {}", args.payload.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&payload_text)
        .with_context(|| format!("Failed to parse payload {}", args.payload.display()))?;

    let edited =
        write(&context, &graph, &raw, &Value::from(payload)).context("Failed to write payload")?;

    let output = args.output.unwrap_or(path);
    save_graph(&edited.snapshot, &output, config.persistence.pretty)?;

    let report = WriteReport {
        edited: edited.edited_node_ids.into_iter().collect(),
        warnings: edited.warnings,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    print_info(&format!("Saved snapshot to {}", output.display()), global.quiet);

    Ok(())
}
