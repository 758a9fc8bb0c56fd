//! Reducing a snapshot to what one operation needs.

use std::sync::Arc;

use crate::context::{CacheContext, RawOperation};
use crate::error::Result;
use crate::graph::GraphSnapshot;
use crate::operations::read::read;
use crate::operations::write::write;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct PrunedSnapshot {
    pub snapshot: Arc<GraphSnapshot>,
    /// The operation was fully satisfied by the source snapshot.
    pub complete: bool,
}

/// Reads `raw` from `snapshot` and writes the result into an empty graph.
///
/// An incomplete read writes an empty payload, so the pruned graph then
/// only records the operation's fields as `null`.
pub fn prune(
    context: &CacheContext,
    snapshot: &GraphSnapshot,
    raw: &RawOperation,
) -> Result<PrunedSnapshot> {
    let result = read(context, raw, snapshot, false)?;
    let payload = match &result.result {
        Some(data) if result.complete => data.clone(),
        _ => Value::object(),
    };

    let pruned = write(context, &GraphSnapshot::new(), raw, &payload)?;
    Ok(PrunedSnapshot {
        snapshot: pruned.snapshot,
        complete: result.complete,
    })
}
