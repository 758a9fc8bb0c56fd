//! Inspect command - Summarize a snapshot

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use graphcache_config::GraphCacheConfig;
use graphcache_core::{GraphSnapshot, NodeKind};
use serde::Serialize;

use super::{cache_context, load_graph, resolve_snapshot};
use crate::GlobalOptions;

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Snapshot file (defaults to [persistence] snapshot_path)
    snapshot: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Summary of a snapshot's contents
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SnapshotReport {
    pub nodes: usize,
    pub entities: usize,
    pub parameterized_values: usize,
    pub orphaned: Vec<String>,
    /// `None` when inbound and outbound references mirror each other
    pub consistency_error: Option<String>,
}

impl SnapshotReport {
    pub fn new(graph: &GraphSnapshot) -> Self {
        Self {
            nodes: graph.len(),
            entities: graph.count_kind(NodeKind::Entity),
            parameterized_values: graph.count_kind(NodeKind::ParameterizedValue),
            orphaned: graph.orphaned_node_ids().into_iter().cloned().collect(),
            consistency_error: graph.verify_references().err().map(|e| e.to_string()),
        }
    }
}

/// Execute the inspect command
pub fn execute(args: InspectArgs, config: &GraphCacheConfig, _global: &GlobalOptions) -> Result<()> {
    let path = resolve_snapshot(args.snapshot, config)?;
    let context = cache_context(config);
    let graph = load_graph(&path, &context)?;
    let report = SnapshotReport::new(&graph);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Snapshot: {}", path.display());
    println!("  Nodes:                {}", report.nodes);
    println!("  Entities:             {}", report.entities);
    println!("  Parameterized values: {}", report.parameterized_values);
    if report.orphaned.is_empty() {
        println!("  Orphaned nodes:       none");
    } else {
        println!("  Orphaned nodes:       {}", report.orphaned.join(", "));
    }
    match report.consistency_error {
        Some(ref error) => println!("  References:           {}", error),
        None => println!("  References:           ok"),
    }

    Ok(())
}
