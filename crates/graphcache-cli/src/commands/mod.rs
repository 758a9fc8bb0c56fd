//! CLI command implementations
//!
//! Every command works on a snapshot file: the serialized form produced by
//! `graphcache_core::extract`. A missing file is an empty cache.

pub mod config;
pub mod inspect;
pub mod prune;
pub mod read;
pub mod verify;
pub mod write;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use graphcache_config::{ConfigLoader, GraphCacheConfig};
use graphcache_core::{
    extract, restore, CacheConfig, CacheContext, Document, GraphSnapshot, RawOperation,
    SerializedGraph, Variables,
};
use tracing::debug;

use crate::GlobalOptions;

/// Query selection shared by the commands that run one.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// File holding the GraphQL document
    #[arg(long, value_name = "FILE")]
    pub query: PathBuf,

    /// Variables as a JSON object
    #[arg(long, value_name = "JSON")]
    pub variables: Option<String>,
}

/// Load configuration with optional config file override.
pub fn load_config(global: &GlobalOptions) -> Result<GraphCacheConfig> {
    let overrides = global.to_config_overrides();
    let mut loader = ConfigLoader::new();

    if let Some(ref config_path) = global.config {
        return loader
            .load_file(config_path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", config_path.display()));
    }

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    loader
        .load(&working_dir, Some(&overrides))
        .context("Failed to load configuration")
}

/// Build the engine configuration from the `[cache]` section.
pub fn cache_context(config: &GraphCacheConfig) -> CacheContext {
    CacheContext::new(
        CacheConfig::new()
            .strict(config.cache.strict)
            .verify_snapshots(config.cache.verify_snapshots)
            .verbose(config.cache.verbose),
    )
}

/// The snapshot argument, or the configured default.
pub fn resolve_snapshot(snapshot: Option<PathBuf>, config: &GraphCacheConfig) -> Result<PathBuf> {
    match snapshot {
        Some(path) => Ok(path),
        None => {
            let working_dir =
                std::env::current_dir().context("Failed to get current directory")?;
            Ok(config.snapshot_path(&working_dir))
        }
    }
}

/// Load a snapshot file into a graph. A missing file is an empty graph.
pub fn load_graph(path: &Path, context: &CacheContext) -> Result<Arc<GraphSnapshot>> {
    if !path.exists() {
        debug!("Snapshot {} not found, starting empty", path.display());
        return Ok(Arc::new(GraphSnapshot::new()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let serialized: SerializedGraph = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    let restored = restore(&serialized, context)
        .with_context(|| format!("Failed to restore snapshot {}", path.display()))?;

    debug!(
        nodes = restored.snapshot.baseline.len(),
        "Loaded snapshot {}",
        path.display()
    );
    Ok(restored.snapshot.baseline)
}

/// Serialize a graph to JSON text.
pub fn serialize_graph(graph: &GraphSnapshot, pretty: bool) -> Result<String> {
    let serialized = extract(graph).context("Failed to serialize snapshot")?;
    let text = if pretty {
        serde_json::to_string_pretty(&serialized)?
    } else {
        serde_json::to_string(&serialized)?
    };
    Ok(text)
}

/// Save a graph, creating parent directories as needed.
pub fn save_graph(graph: &GraphSnapshot, path: &Path, pretty: bool) -> Result<()> {
    let text = serialize_graph(graph, pretty)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))
}

/// Parse the query file and bind variables.
pub fn load_operation(args: &QueryArgs) -> Result<(Arc<Document>, Option<Variables>)> {
    let source = std::fs::read_to_string(&args.query)
        .with_context(|| format!("Failed to read query {}", args.query.display()))?;
    let document = Document::parse(&source)
        .with_context(|| format!("Failed to parse query {}", args.query.display()))?;

    let variables = args
        .variables
        .as_deref()
        .map(parse_variables)
        .transpose()?;
    Ok((Arc::new(document), variables))
}

/// The document's operation with variables bound.
pub fn operation(args: &QueryArgs) -> Result<RawOperation> {
    let (document, variables) = load_operation(args)?;
    let mut raw = RawOperation::new(document);
    if let Some(variables) = variables {
        raw = raw.with_variables(variables);
    }
    Ok(raw)
}

fn parse_variables(text: &str) -> Result<Variables> {
    match serde_json::from_str(text).context("Failed to parse --variables")? {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("--variables must be a JSON object, got {}", other),
    }
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
