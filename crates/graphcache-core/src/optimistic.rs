//! Pending optimistic updates.
//!
//! The queue is an ordered log of speculative writes, grouped by the change
//! id of the transaction that produced them. It is never edited in place:
//! [`OptimisticUpdateQueue::enqueue`] and [`OptimisticUpdateQueue::remove`]
//! return new queues, so snapshots holding the old one keep seeing it.

use std::sync::Arc;

use tracing::debug;

use crate::context::{CacheContext, RawOperation};
use crate::error::Result;
use crate::graph::GraphSnapshot;
use crate::operations::editor::{EditedSnapshot, SnapshotEditor};
use crate::value::Value;

/// Identifies one optimistic transaction.
pub type ChangeId = String;

/// A single speculative write.
#[derive(Debug, Clone)]
pub struct OptimisticDelta {
    pub operation: RawOperation,
    pub payload: Value,
}

#[derive(Debug)]
pub struct OptimisticUpdate {
    pub change_id: ChangeId,
    pub deltas: Vec<OptimisticDelta>,
}

#[derive(Debug, Clone, Default)]
pub struct OptimisticUpdateQueue {
    updates: Vec<Arc<OptimisticUpdate>>,
}

impl OptimisticUpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue with `deltas` appended under `change_id`.
    pub fn enqueue(&self, change_id: impl Into<ChangeId>, deltas: Vec<OptimisticDelta>) -> Self {
        let mut updates = self.updates.clone();
        updates.push(Arc::new(OptimisticUpdate {
            change_id: change_id.into(),
            deltas,
        }));
        Self { updates }
    }

    /// A queue without the updates of `change_id`.
    pub fn remove(&self, change_id: &str) -> Self {
        Self {
            updates: self
                .updates
                .iter()
                .filter(|update| update.change_id != change_id)
                .cloned()
                .collect(),
        }
    }

    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn change_ids(&self) -> impl Iterator<Item = &str> {
        self.updates.iter().map(|update| update.change_id.as_str())
    }

    /// Replays every delta, oldest first, on top of `baseline`.
    pub fn apply(&self, context: &CacheContext, baseline: &GraphSnapshot) -> Result<EditedSnapshot> {
        let mut editor = SnapshotEditor::new(context, baseline);
        for update in &self.updates {
            for delta in &update.deltas {
                editor.merge_payload(&delta.operation, &delta.payload)?;
            }
        }
        debug!(updates = self.updates.len(), "Replayed optimistic updates");
        editor.commit()
    }
}
