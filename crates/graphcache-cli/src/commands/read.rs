//! Read command - Run a query against a snapshot

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use graphcache_config::GraphCacheConfig;
use graphcache_core::{read, RawOperation, Value};

use super::{cache_context, load_graph, load_operation, resolve_snapshot, QueryArgs};
use crate::GlobalOptions;

/// Arguments for the read command
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Snapshot file (defaults to [persistence] snapshot_path)
    snapshot: Option<PathBuf>,

    #[command(flatten)]
    query: QueryArgs,

    /// Node to root the read at
    #[arg(long, value_name = "ID")]
    root: Option<String>,

    /// Read this fragment of the document instead of its operation
    #[arg(long, value_name = "NAME", requires = "root")]
    fragment: Option<String>,
}

/// Execute the read command
pub fn execute(args: ReadArgs, config: &GraphCacheConfig, _global: &GlobalOptions) -> Result<()> {
    let path = resolve_snapshot(args.snapshot, config)?;
    let context = cache_context(config);
    let graph = load_graph(&path, &context)?;

    let (document, variables) = load_operation(&args.query)?;
    let mut raw = match (args.fragment, args.root) {
        (Some(fragment), Some(root)) => RawOperation::fragment(document, fragment, root),
        (None, Some(root)) => RawOperation::new(document).with_root_id(root),
        _ => RawOperation::new(document),
    };
    if let Some(variables) = variables {
        raw = raw.with_variables(variables);
    }

    let result = read(&context, &raw, &graph, false).context("Failed to read query")?;
    let output = serde_json::json!({
        "result": result.result.as_ref().map(Value::to_json),
        "complete": result.complete,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
