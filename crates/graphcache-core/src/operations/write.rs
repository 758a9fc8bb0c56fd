//! Writing a payload into a graph snapshot.

use crate::context::{CacheContext, RawOperation};
use crate::error::Result;
use crate::graph::GraphSnapshot;
use crate::operations::editor::{EditedSnapshot, SnapshotEditor};
use crate::tracer::WriteEnd;
use crate::value::Value;

/// Merges `payload` for `raw` into `snapshot`, producing a new snapshot.
///
/// `snapshot` itself is never modified; on error nothing is produced.
pub fn write(
    context: &CacheContext,
    snapshot: &GraphSnapshot,
    raw: &RawOperation,
    payload: &Value,
) -> Result<EditedSnapshot> {
    let operation = context.parse_operation(raw)?;
    context.tracer().write_start(&operation, payload);

    let mut editor = SnapshotEditor::new(context, snapshot);
    editor.merge_payload(raw, payload)?;
    let edited = editor.commit()?;

    context.tracer().write_end(
        &operation,
        WriteEnd {
            payload,
            edited_node_ids: &edited.edited_node_ids,
            warnings: &edited.warnings,
        },
    );
    Ok(edited)
}
